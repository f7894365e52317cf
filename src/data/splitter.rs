// ============================================================
// Layer 4 — Train/Validation/Test Splitter
// ============================================================
// Shuffles samples with a FIXED seed and splits them into:
//   - Training set:   used to update the adapter weights
//   - Validation set: loss tracked each epoch, never trained on
//   - Test set:       only used for generation and scoring
//
// Split ratio: 80% / 10% / 10%
//
// The split is done in two steps:
//   1. hold out ceil(20%) of the shuffled samples
//   2. give ceil(50%) of the held-out part to test, the rest
//      to validation
//
// Because the RNG is seeded, the same input and seed always
// produce exactly the same three splits.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom on a
// StdRng seeded with seed_from_u64.
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// One in every HOLDOUT_DIVISOR samples is held out from training (20%)
const HOLDOUT_DIVISOR: usize = 5;

/// The three disjoint partitions of a corpus
#[derive(Debug, Clone)]
pub struct DataSplits<T> {
    pub train:      Vec<T>,
    pub validation: Vec<T>,
    pub test:       Vec<T>,
}

impl<T> DataSplits<T> {
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// Shuffle with `seed` and split into train / validation / test.
///
/// # Example
/// ```ignore
/// let splits = split_three_way(all_examples, 42);
/// // 80% train, 10% validation, 10% test
/// ```
pub fn split_three_way<T>(mut samples: Vec<T>, seed: u64) -> DataSplits<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    // Integer ceilings keep the sizes exact, no float rounding
    let total     = samples.len();
    let n_holdout = total.div_ceil(HOLDOUT_DIVISOR);
    let n_test    = n_holdout.div_ceil(2);

    // split_off(n) keeps [0..n) and returns [n..)
    let mut holdout = samples.split_off(total - n_holdout);
    let test        = holdout.split_off(n_holdout - n_test);

    tracing::debug!(
        "Dataset split: {} train, {} validation, {} test",
        samples.len(),
        holdout.len(),
        test.len(),
    );

    DataSplits {
        train:      samples,
        validation: holdout,
        test,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_three_way_sizes() {
        let items: Vec<usize> = (0..1000).collect();
        let splits = split_three_way(items, 42);
        assert_eq!(splits.train.len(),      800);
        assert_eq!(splits.validation.len(), 100);
        assert_eq!(splits.test.len(),       100);
    }

    #[test]
    fn test_three_way_sizes_with_rounding() {
        // 67_349 rows, the size of the SST-2 training split
        let n      = 67_349usize;
        let splits = split_three_way((0..n).collect::<Vec<_>>(), 42);

        assert_eq!(splits.total(), n);
        let close = |got: usize, frac: f64| (got as f64 - frac * n as f64).abs() <= 2.0;
        assert!(close(splits.train.len(),      0.8));
        assert!(close(splits.validation.len(), 0.1));
        assert!(close(splits.test.len(),       0.1));
    }

    #[test]
    fn test_three_way_is_a_partition() {
        let items: Vec<usize> = (0..257).collect();
        let splits = split_three_way(items, 7);

        let mut seen = HashSet::new();
        for x in splits.train.iter().chain(&splits.validation).chain(&splits.test) {
            // insert returns false on duplicates → overlap between splits
            assert!(seen.insert(*x));
        }
        assert_eq!(seen.len(), 257);
    }

    #[test]
    fn test_three_way_is_reproducible() {
        let a = split_three_way((0..500).collect::<Vec<usize>>(), 42);
        let b = split_three_way((0..500).collect::<Vec<usize>>(), 42);
        assert_eq!(a.train,      b.train);
        assert_eq!(a.validation, b.validation);
        assert_eq!(a.test,       b.test);

        let c = split_three_way((0..500).collect::<Vec<usize>>(), 43);
        assert_ne!(a.train, c.train);
    }

    #[test]
    fn test_three_way_tiny_inputs() {
        let empty = split_three_way(Vec::<usize>::new(), 42);
        assert_eq!(empty.total(), 0);

        let one = split_three_way(vec![1usize], 42);
        assert_eq!(one.total(), 1);
        assert_eq!(one.test.len(), 1);
    }
}
