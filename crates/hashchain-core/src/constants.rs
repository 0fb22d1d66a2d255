pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const GENESIS_TIMESTAMP: &str = "01/01/2018";
pub const GENESIS_DATA: &str = "Block 0";
pub const GENESIS_PREVIOUS_HASH: &str = "0";
/// Mining loops look at their stop signal once per this many attempts.
pub const STOP_POLL_INTERVAL: u64 = 1024;
pub const DEFAULT_DIFFICULTY: u32 = 2;
