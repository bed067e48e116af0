//! Per-channel input normalization.

use crate::{Error, Result};
use ndarray::Array4;

/// CIFAR-10 per-channel mean.
pub const CIFAR10_MEAN: [f32; 3] = [0.4914, 0.4822, 0.4465];
/// CIFAR-10 per-channel standard deviation.
pub const CIFAR10_STD: [f32; 3] = [0.2471, 0.2435, 0.2616];

/// Per-channel affine transform `(x - mean) / std` mapping raw pixels into
/// the distribution the classifier expects.
#[derive(Debug, Clone)]
pub struct Normalizer {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalizer {
    /// Create a normalizer from per-channel statistics.
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![mean.len()],
                actual: vec![std.len()],
            });
        }
        if std.iter().any(|&s| s <= 0.0) {
            return Err(Error::config("normalizer.std", "all channel stds must be positive"));
        }
        Ok(Self { mean, std })
    }

    /// The standard CIFAR-10 statistics.
    pub fn cifar10() -> Self {
        Self { mean: CIFAR10_MEAN.to_vec(), std: CIFAR10_STD.to_vec() }
    }

    /// Number of channels this normalizer covers.
    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    /// Normalize a batch of images, `(batch, channels, height, width)`.
    pub fn apply(&self, input: &Array4<f32>) -> Array4<f32> {
        assert_eq!(
            input.dim().1,
            self.channels(),
            "input channel count must match normalizer statistics"
        );
        let mut out = input.clone();
        for mut image in out.outer_iter_mut() {
            for (ch, mut plane) in image.outer_iter_mut().enumerate() {
                let (mean, std) = (self.mean[ch], self.std[ch]);
                plane.mapv_inplace(|v| (v - mean) / std);
            }
        }
        out
    }
}
