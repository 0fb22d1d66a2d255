#![allow(dead_code)]

use hashchain_core::{Block, Chain};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{json, Value};

pub const TIMESTAMP: &str = "01/01/2018";

pub fn amount_block(index: u64, amount: u64) -> Block {
    Block::new(index, TIMESTAMP, json!({ "amount": amount }))
}

pub fn random_payload(rng: &mut StdRng) -> Value {
    match rng.gen_range(0..4) {
        0 => json!({ "amount": rng.gen::<u32>(), "memo": format!("memo-{}", rng.gen::<u16>()) }),
        1 => json!([rng.gen::<bool>(), rng.gen::<i64>(), null]),
        2 => json!(format!("note-{}", rng.gen::<u64>())),
        _ => json!({ "nested": { "z": rng.gen::<u8>(), "a": [1, 2, 3] } }),
    }
}

/// A chain with `count` blocks after genesis, built from seeded random payloads.
pub fn seeded_chain(seed: u64, count: u64, difficulty: Option<u32>) -> Chain {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut chain = match difficulty {
        Some(d) => Chain::with_difficulty(d),
        None => Chain::new(),
    };
    for index in 1..=count {
        chain.add_block(Block::new(index, TIMESTAMP, random_payload(&mut rng)));
    }
    chain
}

/// Rewrites every block from `from` onward so the links and hashes line up
/// again, without doing any proof-of-work.
pub fn rechain_from(chain: &mut Chain, from: usize) {
    let blocks = chain.blocks_mut();
    blocks[from].rehash();
    for i in from + 1..blocks.len() {
        blocks[i].previous_hash = blocks[i - 1].hash().to_owned();
        blocks[i].rehash();
    }
}

/// Same as [`rechain_from`] but re-mines each rewritten block.
pub fn remine_from(chain: &mut Chain, from: usize, difficulty: u32) {
    let blocks = chain.blocks_mut();
    blocks[from].mine(difficulty);
    for i in from + 1..blocks.len() {
        blocks[i].previous_hash = blocks[i - 1].hash().to_owned();
        blocks[i].mine(difficulty);
    }
}
