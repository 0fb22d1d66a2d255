pub mod chain;
pub mod constants;
pub mod error;
pub mod mine;

use crate::constants::{GENESIS_DATA, GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

pub use chain::{Chain, ChainConfig};
pub use error::{ChainError, Result, ValidationError};
pub use pow::{MinedStats, StopSignal};

pub type Hash = [u8; 32];

/// Opaque block time. Only its textual form matters to the hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Unix(i64),
    Text(String),
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Unix(secs) => write!(f, "{secs}"),
            Timestamp::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Timestamp {
    fn from(text: &str) -> Self {
        Timestamp::Text(text.to_owned())
    }
}

impl From<String> for Timestamp {
    fn from(text: String) -> Self {
        Timestamp::Text(text)
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Timestamp::Unix(secs)
    }
}

pub fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Compact JSON with object keys in lexicographic order at every depth,
/// regardless of `serde_json`'s map ordering features.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: Timestamp,
    pub data: Value,
    pub previous_hash: String,
    /// Only set once a proof-of-work chain has sealed the block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    hash: String,
}

impl Block {
    pub fn new(index: u64, timestamp: impl Into<Timestamp>, data: impl Into<Value>) -> Self {
        Self::with_previous_hash(index, timestamp, data, GENESIS_PREVIOUS_HASH)
    }

    pub fn with_previous_hash(
        index: u64,
        timestamp: impl Into<Timestamp>,
        data: impl Into<Value>,
        previous_hash: impl Into<String>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp: timestamp.into(),
            data: data.into(),
            previous_hash: previous_hash.into(),
            nonce: None,
            hash: String::new(),
        };
        block.rehash();
        block
    }

    /// Builds a block from any serializable payload. Fails when the payload
    /// has no JSON form (non-string map keys, failing `Serialize` impls).
    pub fn from_payload<T: Serialize + ?Sized>(
        index: u64,
        timestamp: impl Into<Timestamp>,
        payload: &T,
    ) -> Result<Self> {
        let data = serde_json::to_value(payload)?;
        Ok(Self::new(index, timestamp, data))
    }

    pub fn genesis() -> Self {
        Self::with_previous_hash(0, GENESIS_TIMESTAMP, GENESIS_DATA, GENESIS_PREVIOUS_HASH)
    }

    /// Hash as last assigned. May be stale if fields were edited since.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Everything that goes into the hash except the nonce.
    pub fn preimage_prefix(&self) -> String {
        format!(
            "{}{}{}{}",
            self.index,
            self.previous_hash,
            self.timestamp,
            canonical_json(&self.data)
        )
    }

    /// SHA-256 over the current fields, hex encoded. Never touches `hash`.
    pub fn compute_hash(&self) -> String {
        let mut preimage = self.preimage_prefix();
        if let Some(nonce) = self.nonce {
            preimage.push_str(&nonce.to_string());
        }
        hex::encode(sha256(preimage.as_bytes()))
    }

    pub fn rehash(&mut self) -> &str {
        self.hash = self.compute_hash();
        &self.hash
    }

    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Brute-forces the nonce until the hash has `difficulty` leading zero hex
    /// digits. Unbounded; see [`Block::mine_until`] for a stoppable search.
    pub fn mine(&mut self, difficulty: u32) -> MinedStats {
        match self.search(difficulty, |_| Ok::<(), Infallible>(())) {
            Ok(stats) => stats,
            Err(never) => match never {},
        }
    }

    /// Like [`Block::mine`], but gives up once `stop` fires. A cancelled block
    /// keeps the last nonce it tried together with that nonce's hash, so
    /// mining it again resumes where it left off.
    pub fn mine_until(&mut self, difficulty: u32, stop: &StopSignal) -> Result<MinedStats> {
        self.search(difficulty, |attempts| {
            if attempts % constants::STOP_POLL_INTERVAL == 0 && stop.should_stop() {
                Err(ChainError::MiningCancelled { attempts })
            } else {
                Ok(())
            }
        })
    }

    /// Nonce search loop. `poll` runs after every miss with the attempt count;
    /// an `Err` from it ends the search with the last tried nonce sealed.
    fn search<E>(
        &mut self,
        difficulty: u32,
        mut poll: impl FnMut(u64) -> std::result::Result<(), E>,
    ) -> std::result::Result<MinedStats, E> {
        let started = Instant::now();
        let prefix = self.preimage_prefix();
        let mut nonce = self.nonce.unwrap_or(0);
        let mut attempts = 0u64;
        loop {
            let digest = pow::digest_with_nonce(&prefix, nonce);
            attempts += 1;
            if pow::leading_zero_nibbles(&digest) >= difficulty {
                self.seal(nonce, hex::encode(digest));
                let stats = MinedStats {
                    nonce,
                    hash: self.hash.clone(),
                    attempts,
                    elapsed: started.elapsed(),
                };
                info!(
                    "Mined block {} with nonce {} and hash {}",
                    self.index, stats.nonce, stats.hash
                );
                return Ok(stats);
            }
            if let Err(err) = poll(attempts) {
                self.seal(nonce, hex::encode(digest));
                debug!(index = self.index, nonce, attempts, "mining stopped");
                return Err(err);
            }
            nonce = nonce.wrapping_add(1);
        }
    }

    pub(crate) fn seal(&mut self, nonce: u64, hash: String) {
        self.nonce = Some(nonce);
        self.hash = hash;
    }
}

pub mod pow {
    use super::{sha256, Hash};
    use crate::constants::HASH_HEX_SIZE;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Outcome of a successful nonce search.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct MinedStats {
        pub nonce: u64,
        pub hash: String,
        pub attempts: u64,
        pub elapsed: Duration,
    }

    /// Shared cancellation flag with an optional deadline. Clones observe the
    /// same flag.
    #[derive(Clone, Debug, Default)]
    pub struct StopSignal {
        cancelled: Arc<AtomicBool>,
        deadline: Option<Instant>,
    }

    impl StopSignal {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_deadline(mut self, deadline: Instant) -> Self {
            self.deadline = Some(deadline);
            self
        }

        /// A timeout too large to represent as an `Instant` leaves the
        /// signal without a deadline.
        pub fn with_timeout(self, timeout: Duration) -> Self {
            match Instant::now().checked_add(timeout) {
                Some(deadline) => self.with_deadline(deadline),
                None => self,
            }
        }

        pub fn cancel(&self) {
            self.cancelled.store(true, Ordering::Relaxed);
        }

        pub fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::Relaxed)
        }

        pub fn deadline(&self) -> Option<Instant> {
            self.deadline
        }

        pub fn should_stop(&self) -> bool {
            self.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
        }
    }

    pub fn digest_with_nonce(prefix: &str, nonce: u64) -> Hash {
        let mut preimage = String::with_capacity(prefix.len() + 20);
        preimage.push_str(prefix);
        preimage.push_str(&nonce.to_string());
        sha256(preimage.as_bytes())
    }

    /// Leading zero hex digits of a raw digest.
    pub fn leading_zero_nibbles(digest: &Hash) -> u32 {
        let mut total = 0u32;
        for b in digest {
            if *b == 0 {
                total += 2;
            } else {
                if *b < 0x10 {
                    total += 1;
                }
                break;
            }
        }
        total
    }

    pub fn leading_zero_hex(hash: &str) -> usize {
        hash.chars().take_while(|c| *c == '0').count()
    }

    /// Whether any SHA-256 hex digest can have `difficulty` leading zeros.
    pub fn is_attainable(difficulty: u32) -> bool {
        difficulty as usize <= HASH_HEX_SIZE
    }

    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        is_attainable(difficulty) && leading_zero_hex(hash) >= difficulty as usize
    }
}
