//! In-memory image datasets.

use crate::{Error, Result};
use ndarray::{Array3, Array4, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// One labelled image. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Image tensor, `(channels, height, width)`.
    pub image: Array3<f32>,
    /// Integer class label.
    pub label: i64,
}

/// Ordered sequence of samples.
///
/// Clean and adversarial variants of the training data are kept as parallel,
/// independently-indexed datasets; pairing during training is positional.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    /// Build a dataset from stacked images and a label vector.
    ///
    /// The leading dimensions must agree.
    pub fn from_arrays(images: Array4<f32>, labels: &[i64]) -> Result<Self> {
        if images.len_of(Axis(0)) != labels.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![labels.len()],
                actual: vec![images.len_of(Axis(0))],
            });
        }
        let samples = images
            .outer_iter()
            .zip(labels.iter())
            .map(|(image, &label)| Sample { image: image.to_owned(), label })
            .collect();
        Ok(Self { samples })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at index `i`.
    pub fn get(&self, i: usize) -> &Sample {
        &self.samples[i]
    }

    /// Iterate over samples in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// `(channels, height, width)` of the stored images, or `None` if empty.
    pub fn image_shape(&self) -> Option<(usize, usize, usize)> {
        self.samples.first().map(|s| s.image.dim())
    }

    /// Largest label value plus one, or 0 if empty.
    pub fn num_classes(&self) -> usize {
        self.samples.iter().map(|s| s.label as usize + 1).max().unwrap_or(0)
    }

    /// Shuffle and truncate to `floor(n * pct / 100)` samples.
    ///
    /// No-op for `pct >= 100`.
    pub fn subsample(&mut self, pct: f64, rng: &mut StdRng) {
        if pct >= 100.0 {
            return;
        }
        let keep = (self.samples.len() as f64 * pct / 100.0).floor() as usize;
        self.samples.shuffle(rng);
        self.samples.truncate(keep);
    }

    /// Repeat the whole dataset `k` times, preserving order within each tile.
    ///
    /// Used to keep positional pairing valid when the adversarial side
    /// concatenates several attacks.
    pub fn tiled(&self, k: usize) -> Self {
        let mut samples = Vec::with_capacity(self.samples.len() * k);
        for _ in 0..k {
            samples.extend(self.samples.iter().cloned());
        }
        Self { samples }
    }
}

impl FromIterator<Sample> for Dataset {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self { samples: iter.into_iter().collect() }
    }
}
