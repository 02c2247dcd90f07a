//! CSPRNG helpers (§4.1). All randomness used for padding, IVs, session
//! tags and peer-selection shuffles goes through here so it is backed by a
//! single well-reviewed source (`rand::rngs::OsRng` seeding a thread-local
//! CSPRNG), per the design note on random-padding side channels (§9).

use rand::seq::SliceRandom;
use rand::Rng;

pub fn rand_bytes(out: &mut [u8]) {
    rand::thread_rng().fill(out);
}

pub fn rand_vec(len: usize) -> Vec<u8> {
    let mut v = vec![0u8; len];
    rand_bytes(&mut v);
    v
}

/// Inclusive-exclusive: returns a value in `[lo, hi)`.
pub fn rand_u32_in(lo: u32, hi: u32) -> u32 {
    assert!(lo < hi, "empty range");
    rand::thread_rng().gen_range(lo..hi)
}

pub fn rand_u32() -> u32 {
    rand::thread_rng().gen()
}

/// Fisher-Yates shuffle in place, matching the teacher's reliance on
/// `rand` for peer-list and build-record permutation shuffles.
pub fn shuffle<T>(items: &mut [T]) {
    items.shuffle(&mut rand::thread_rng());
}

/// A shuffled permutation of `0..n`, used to scatter real build records
/// among the padding records of a VariableTunnelBuild message (§4.6).
pub fn shuffled_indices(n: usize) -> Vec<usize> {
    let mut v: Vec<usize> = (0..n).collect();
    shuffle(&mut v);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffled_indices_is_a_permutation() {
        let mut v = shuffled_indices(20);
        v.sort_unstable();
        assert_eq!(v, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn rand_u32_in_is_within_bounds() {
        for _ in 0..1000 {
            let x = rand_u32_in(10, 20);
            assert!(x >= 10 && x < 20);
        }
    }
}
