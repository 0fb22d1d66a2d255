use crate::{
    error::ValidationError,
    mine::mine_parallel,
    pow::{is_attainable, leading_zero_hex},
    Block, ChainError, Result, StopSignal,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How a chain seals the blocks handed to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// `None` chains blocks by hash only. `Some(d)` also requires `d` leading
    /// zero hex digits on every block after genesis.
    pub difficulty: Option<u32>,
    /// Spread the nonce search over the rayon pool in
    /// [`Chain::add_block_until`].
    pub parallel_mining: bool,
}

/// In-memory, append-only sequence of blocks starting at a fixed genesis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ChainRepr")]
pub struct Chain {
    difficulty: Option<u32>,
    blocks: Vec<Block>,
    #[serde(skip)]
    parallel_mining: bool,
}

#[derive(Deserialize)]
struct ChainRepr {
    #[serde(default)]
    difficulty: Option<u32>,
    blocks: Vec<Block>,
}

impl TryFrom<ChainRepr> for Chain {
    type Error = ChainError;

    fn try_from(repr: ChainRepr) -> Result<Self> {
        if repr.blocks.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        Ok(Self {
            difficulty: repr.difficulty,
            blocks: repr.blocks,
            parallel_mining: false,
        })
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self::from_config(&ChainConfig::default())
    }

    pub fn with_difficulty(difficulty: u32) -> Self {
        Self::from_config(&ChainConfig {
            difficulty: Some(difficulty),
            ..ChainConfig::default()
        })
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        if let Some(difficulty) = config.difficulty.filter(|d| !is_attainable(*d)) {
            warn!(difficulty, "difficulty exceeds the digest length; mining will never finish");
        }
        let mut genesis = Block::genesis();
        // Proof-of-work genesis carries a nonce but is never mined.
        if config.difficulty.is_some() {
            genesis.nonce = Some(0);
            genesis.rehash();
        }
        Self {
            difficulty: config.difficulty,
            blocks: vec![genesis],
            parallel_mining: config.parallel_mining,
        }
    }

    pub fn difficulty(&self) -> Option<u32> {
        self.difficulty
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Direct write access to sealed blocks. Nothing written through here is
    /// re-linked or re-mined; [`Chain::validate`] is what notices it.
    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: genesis is never removed.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn top_block(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Links `candidate` to the current top, mines it when the chain has a
    /// difficulty, and appends it. Never rejects a block; mining is unbounded.
    /// Any nonce the candidate already carries is discarded and the search
    /// starts from 0.
    pub fn add_block(&mut self, mut candidate: Block) -> &Block {
        self.link(&mut candidate);
        if let Some(difficulty) = self.difficulty {
            candidate.mine(difficulty);
        }
        self.push(candidate)
    }

    /// Stoppable [`Chain::add_block`]. When mining is cancelled nothing is
    /// appended and the candidate is dropped.
    pub fn add_block_until(&mut self, mut candidate: Block, stop: &StopSignal) -> Result<&Block> {
        self.link(&mut candidate);
        if let Some(difficulty) = self.difficulty {
            if self.parallel_mining {
                mine_parallel(&mut candidate, difficulty, stop)?;
            } else {
                candidate.mine_until(difficulty, stop)?;
            }
        }
        Ok(self.push(candidate))
    }

    fn link(&self, candidate: &mut Block) {
        candidate.previous_hash = self.top_block().hash().to_owned();
        if self.difficulty.is_some() {
            candidate.nonce = Some(0);
        }
        candidate.rehash();
    }

    fn push(&mut self, block: Block) -> &Block {
        debug!(
            index = block.index,
            position = self.blocks.len(),
            hash = block.hash(),
            "block appended"
        );
        self.blocks.push(block);
        self.top_block()
    }

    pub fn is_chain_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Recomputes every non-genesis block's hash and checks its link to the
    /// predecessor, then the work target when the chain has one. Genesis is
    /// taken as given.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        for (offset, pair) in self.blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let position = offset + 1;

            if !current.has_valid_hash() {
                return reject(ValidationError::StaleHash { position });
            }
            if current.previous_hash != previous.hash() {
                return reject(ValidationError::BrokenLink { position });
            }
            if let Some(difficulty) = self.difficulty {
                let found = leading_zero_hex(current.hash());
                if found < difficulty as usize {
                    return reject(ValidationError::InsufficientWork {
                        position,
                        difficulty,
                        found,
                    });
                }
            }
        }
        Ok(())
    }

    /// [`Chain::validate`] plus `index == position` for every block.
    pub fn validate_strict(&self) -> std::result::Result<(), ValidationError> {
        self.validate()?;
        for (position, block) in self.blocks.iter().enumerate() {
            if block.index != position as u64 {
                return reject(ValidationError::IndexMismatch {
                    position,
                    index: block.index,
                });
            }
        }
        Ok(())
    }
}

fn reject(err: ValidationError) -> std::result::Result<(), ValidationError> {
    warn!("chain rejected: {err}");
    Err(err)
}
