//! Batch construction over a dataset.

use super::dataset::Dataset;
use ndarray::{Array1, Array4, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// A training batch: stacked image inputs and integer targets.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Input images, `(batch, channels, height, width)`.
    pub input: Array4<f32>,
    /// Target labels.
    pub target: Array1<i64>,
}

impl Batch {
    /// Number of samples in the batch.
    pub fn size(&self) -> usize {
        self.target.len()
    }
}

/// Restartable batch source over a dataset.
///
/// Each call to [`Batches::iter`] produces a fresh pass. With shuffle enabled
/// a new permutation is drawn from the supplied RNG on every pass.
///
/// # Example
///
/// ```no_run
/// # use endurecer::data::{Batches, Dataset};
/// # use rand::{rngs::StdRng, SeedableRng};
/// # let dataset: Dataset = todo!();
/// let batches = Batches::new(dataset, 128).with_shuffle(true);
/// let mut rng = StdRng::seed_from_u64(0);
/// for batch in batches.iter(&mut rng) {
///     println!("batch of {}", batch.size());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Batches {
    dataset: Dataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
}

impl Batches {
    /// Wrap a dataset with a batch size. Shuffle and drop-last default off.
    pub fn new(dataset: Dataset, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        Self { dataset, batch_size, shuffle: false, drop_last: false }
    }

    /// Enable or disable per-pass shuffling.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Drop the final partial batch instead of yielding it.
    pub fn with_drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Number of batches one pass yields: `ceil(n / batch_size)`, or
    /// `floor(n / batch_size)` with drop-last.
    pub fn len(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    /// Whether a pass yields no batches.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of underlying samples.
    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    /// Start a fresh pass. The RNG is only consulted when shuffle is on.
    pub fn iter(&self, rng: &mut StdRng) -> BatchIter<'_> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(rng);
        }
        BatchIter { source: self, order, pos: 0 }
    }
}

/// One pass over a [`Batches`] source.
pub struct BatchIter<'a> {
    source: &'a Batches,
    order: Vec<usize>,
    pos: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let remaining = self.order.len() - self.pos;
        if remaining == 0 {
            return None;
        }
        let take = remaining.min(self.source.batch_size);
        if take < self.source.batch_size && self.source.drop_last {
            return None;
        }

        let idxs = &self.order[self.pos..self.pos + take];
        self.pos += take;

        let (c, h, w) = self
            .source
            .dataset
            .image_shape()
            .expect("non-empty pass implies a non-empty dataset");
        let mut input = Array4::zeros((take, c, h, w));
        let mut target = Array1::zeros(take);
        for (bi, &si) in idxs.iter().enumerate() {
            let sample = self.source.dataset.get(si);
            input.index_axis_mut(Axis(0), bi).assign(&sample.image);
            target[bi] = sample.label;
        }
        Some(Batch { input, target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use rand::SeedableRng;

    fn toy(n: usize) -> Dataset {
        let images = Array4::from_shape_fn((n, 1, 2, 2), |(i, _, _, _)| i as f32);
        let labels: Vec<i64> = (0..n as i64).collect();
        Dataset::from_arrays(images, &labels).unwrap()
    }

    #[test]
    fn test_batch_count_is_ceil() {
        let batches = Batches::new(toy(10), 4);
        assert_eq!(batches.len(), 3);
        let mut rng = StdRng::seed_from_u64(0);
        let sizes: Vec<usize> = batches.iter(&mut rng).map(|b| b.size()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_drop_last_floors() {
        let batches = Batches::new(toy(10), 4).with_drop_last(true);
        assert_eq!(batches.len(), 2);
        let mut rng = StdRng::seed_from_u64(0);
        let sizes: Vec<usize> = batches.iter(&mut rng).map(|b| b.size()).collect();
        assert_eq!(sizes, vec![4, 4]);
    }

    #[test]
    fn test_unshuffled_order_is_positional() {
        let batches = Batches::new(toy(6), 3);
        let mut rng = StdRng::seed_from_u64(0);
        let first = batches.iter(&mut rng).next().unwrap();
        assert_eq!(first.target.to_vec(), vec![0, 1, 2]);
        // images follow the same indices
        assert_eq!(first.input[[2, 0, 0, 0]], 2.0);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let batches = Batches::new(toy(5), 2);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(batches.iter(&mut rng).count(), 3);
        assert_eq!(batches.iter(&mut rng).count(), 3);
    }

    #[test]
    fn test_shuffle_draws_new_permutation_each_pass() {
        let batches = Batches::new(toy(64), 64).with_shuffle(true);
        let mut rng = StdRng::seed_from_u64(42);
        let a = batches.iter(&mut rng).next().unwrap().target.to_vec();
        let b = batches.iter(&mut rng).next().unwrap().target.to_vec();
        assert_ne!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..64).collect::<Vec<i64>>());
    }

    #[test]
    fn test_empty_dataset_yields_nothing() {
        let batches = Batches::new(Dataset::default(), 4);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(batches.is_empty());
        assert_eq!(batches.iter(&mut rng).count(), 0);
    }
}
