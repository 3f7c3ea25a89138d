//! Deterministic stand-ins for random simulation data.
//!
//! Same inputs always produce the same "random" numbers, which keeps demo
//! results reproducible.

/// FNV-1a hash of `text`, used as a seed.
pub(crate) fn seed(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Pseudo-random value in `low..high` derived from `seed` and `salt`.
pub(crate) fn pick(seed: u64, salt: u64, low: u64, high: u64) -> u64 {
    debug_assert!(low < high);
    // splitmix64 finalizer
    let mut z = seed.wrapping_add(salt.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    low + z % (high - low)
}

/// Pseudo-random fraction in `0.0..1.0`.
pub(crate) fn fraction(seed: u64, salt: u64) -> f64 {
    pick(seed, salt, 0, 10_000) as f64 / 10_000.0
}
