use crate::{
    constants::STOP_POLL_INTERVAL,
    pow::{digest_with_nonce, leading_zero_nibbles},
    Block, ChainError, MinedStats, Result, StopSignal,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Mines a block by searching nonces in parallel until its hash has at least
/// `difficulty` leading zero hex digits.
///
/// The search starts at the block's current nonce (0 when unset). The first
/// worker to hit a valid nonce ends the search for all of them, and so does
/// `stop` firing. On any error the block is left untouched.
pub fn mine_parallel(block: &mut Block, difficulty: u32, stop: &StopSignal) -> Result<MinedStats> {
    let started = Instant::now();
    let prefix = block.preimage_prefix();
    let start = block.nonce.unwrap_or(0);
    let attempts = AtomicU64::new(0);

    // Rayon splits the range across threads. A worker that notices the stop
    // signal "finds" its current nonce, which the check below tells apart
    // from a real hit.
    let found = (start..u64::MAX).into_par_iter().find_any(|nonce| {
        let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if n % STOP_POLL_INTERVAL == 0 && stop.should_stop() {
            return true;
        }
        leading_zero_nibbles(&digest_with_nonce(&prefix, *nonce)) >= difficulty
    });
    let attempts = attempts.into_inner();

    let Some(nonce) = found else {
        return Err(ChainError::NonceSpaceExhausted);
    };
    let digest = digest_with_nonce(&prefix, nonce);
    if leading_zero_nibbles(&digest) < difficulty {
        debug!(index = block.index, attempts, "parallel mining stopped");
        return Err(ChainError::MiningCancelled { attempts });
    }

    let hash = hex::encode(digest);
    block.seal(nonce, hash.clone());
    info!(
        "Mined block {} with nonce {} and hash {} ({} attempts across workers)",
        block.index, nonce, hash, attempts
    );
    Ok(MinedStats {
        nonce,
        hash,
        attempts,
        elapsed: started.elapsed(),
    })
}
