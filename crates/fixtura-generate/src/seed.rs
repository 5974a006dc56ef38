//! Deterministic sub-seed derivation.
//!
//! Every synthesized value is drawn from an RNG seeded by
//! `(session seed, model, field, instance index)`, so output does not depend
//! on the order fields happen to be visited in.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;
const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// FNV-1a over `key`, starting from `seed`.
pub fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = FNV_OFFSET ^ seed;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Sub-seed for one value coordinate.
pub fn derive_subseed(session_seed: u64, model: &str, field: &str, index: u64) -> u64 {
    let hash = hash_seed(hash_seed(session_seed, model), field);
    mix(hash ^ index.wrapping_mul(GOLDEN_GAMMA))
}

/// Seed for retry `attempt` of a coordinate; attempt 0 is the first draw.
pub fn attempt_seed(subseed: u64, attempt: u32) -> u64 {
    mix(subseed ^ u64::from(attempt).wrapping_mul(GOLDEN_GAMMA).rotate_left(17))
}

pub fn rng_for(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Fresh seed for sessions without an explicit one.
pub fn entropy_seed() -> u64 {
    rand::random()
}
