//! Classifier capability interface.
//!
//! The training loop treats the network as a black box behind [`Classifier`];
//! any architecture satisfying it is substitutable. The crate ships
//! [`LinearClassifier`] as the reference implementation.

mod linear;

pub use linear::LinearClassifier;

use crate::Param;
use ndarray::{Array2, Array4};

/// Capability interface for a trainable image classifier.
///
/// `forward` must stash whatever activations `backward` needs; `backward`
/// accumulates gradients into the cells of the parameters returned by
/// `named_parameters`, where the optimizer and checkpointing find them.
pub trait Classifier {
    /// Forward a batch of images `(n, c, h, w)`, returning logits `(n, classes)`.
    fn forward(&mut self, input: &Array4<f32>) -> Array2<f32>;

    /// Accumulate parameter gradients for the most recent forward pass.
    fn backward(&mut self, grad_logits: &Array2<f32>);

    /// Enumerate parameters with their names (used for decay/L1 exclusion
    /// and for state snapshot/restore).
    fn named_parameters(&self) -> Vec<(String, Param)>;

    /// Toggle between training and inference mode.
    fn set_train_mode(&mut self, train: bool);

    /// Number of output classes.
    fn num_classes(&self) -> usize;
}
