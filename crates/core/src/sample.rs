//! Bounded random sampling without replacement.

use rand::seq::SliceRandom;
use rand::Rng;

/// Pick `min(k, items.len())` distinct elements using `rng`.
///
/// The input is never touched; a copy is shuffled and its prefix returned.
pub fn sample_with<T: Clone, R: Rng + ?Sized>(items: &[T], k: usize, rng: &mut R) -> Vec<T> {
    let mut pool = items.to_vec();
    pool.shuffle(rng);
    pool.truncate(k);
    pool
}

/// [`sample_with`] using the thread-local generator.
pub fn sample<T: Clone>(items: &[T], k: usize) -> Vec<T> {
    sample_with(items, k, &mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_returns_min_k_n_distinct() {
        let items: Vec<u32> = (0..20).collect();
        let picked = sample(&items, 5);
        assert_eq!(picked.len(), 5);

        let distinct: HashSet<u32> = picked.iter().copied().collect();
        assert_eq!(distinct.len(), 5);
        assert!(picked.iter().all(|p| items.contains(p)));
    }

    #[test]
    fn test_k_larger_than_population_is_permutation() {
        let items = vec!["a", "b", "c"];
        let mut picked = sample(&items, 10);
        assert_eq!(picked.len(), 3);
        picked.sort();
        assert_eq!(picked, items);
    }

    #[test]
    fn test_input_not_mutated() {
        let items: Vec<u32> = (0..50).collect();
        let before = items.clone();
        let _ = sample(&items, 10);
        assert_eq!(items, before);
    }

    #[test]
    fn test_zero_and_empty() {
        let items = vec![1, 2, 3];
        assert!(sample(&items, 0).is_empty());
        assert!(sample::<u8>(&[], 4).is_empty());
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let items: Vec<u32> = (0..100).collect();
        let a = sample_with(&items, 7, &mut StdRng::seed_from_u64(42));
        let b = sample_with(&items, 7, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
