use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("payload is not encodable as JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("mining stopped after {attempts} attempts")]
    MiningCancelled { attempts: u64 },

    #[error("nonce space exhausted without meeting the difficulty target")]
    NonceSpaceExhausted,

    #[error("a chain must hold at least its genesis block")]
    EmptyChain,
}

/// First defect found while walking a chain. `position` is the offset in the
/// block sequence, not the block's own `index` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("block at position {position} does not match its stored hash")]
    StaleHash { position: usize },

    #[error("block at position {position} does not link to its predecessor")]
    BrokenLink { position: usize },

    #[error(
        "block at position {position} has {found} leading zero digits, difficulty is {difficulty}"
    )]
    InsufficientWork {
        position: usize,
        difficulty: u32,
        found: usize,
    },

    #[error("block at position {position} carries index {index}")]
    IndexMismatch { position: usize, index: u64 },
}
