//! Deterministic RNG stream derivation.
//!
//! Every sampler and every candidate minimization draws from its own `ChaCha8Rng`, seeded
//! from the run's base seed, a stream label and an index. Results therefore do not depend on
//! how work is scheduled across threads.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Stream label for conformational samplers.
pub const SAMPLER_STREAM: u64 = 0x5A4D_504C;
/// Stream label for per-candidate minimization.
pub const MINIMIZER_STREAM: u64 = 0x4D49_4E49;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Mixes `base`, `stream` and `index` into an independent 64-bit seed.
pub fn derive_seed(base: u64, stream: u64, index: u64) -> u64 {
    splitmix64(splitmix64(base ^ splitmix64(stream)) ^ index)
}

pub fn stream_rng(base: u64, stream: u64, index: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_seed(base, stream, index))
}
