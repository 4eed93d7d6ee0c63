//! Pseudo-random input arrays.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Two arrays of `n` floats in `[0, 1)`, reproducible for a given `seed`.
pub fn generate(n: usize, seed: u64) -> (Vec<f32>, Vec<f32>) {
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut a = Vec::with_capacity(n);
    let mut b = Vec::with_capacity(n);
    for _ in 0..n {
        a.push(rng.gen_range(0.0_f32..1.0));
        b.push(rng.gen_range(0.0_f32..1.0));
    }
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_data() {
        assert_eq!(generate(1000, 7), generate(1000, 7));
        assert_ne!(generate(1000, 7), generate(1000, 8));
    }

    #[test]
    fn values_in_unit_interval() {
        let (a, b) = generate(10_000, 42);
        assert_eq!(a.len(), 10_000);
        assert_eq!(b.len(), 10_000);
        assert!(a.iter().chain(&b).all(|x| (0.0..1.0).contains(x)));
        assert_ne!(a, b);
    }
}
