//! Inference-mode traversal of a test set.

use super::loss::{correct_count, cross_entropy};
use super::metrics::StreamMetrics;
use crate::data::{Batches, Normalizer};
use crate::model::Classifier;
use rand::rngs::StdRng;

/// Run the classifier over a full set without updating weights.
///
/// Switches the model to inference mode and accumulates aggregate
/// loss/accuracy. The RNG is only consulted if the source shuffles, which
/// test traversals do not.
pub fn evaluate<C: Classifier>(
    model: &mut C,
    normalizer: &Normalizer,
    batches: &Batches,
    rng: &mut StdRng,
) -> StreamMetrics {
    model.set_train_mode(false);
    let mut metrics = StreamMetrics::new();
    for batch in batches.iter(rng) {
        let input = normalizer.apply(&batch.input);
        let logits = model.forward(&input);
        let (loss, _) = cross_entropy(&logits, &batch.target);
        metrics.record(loss, correct_count(&logits, &batch.target), batch.size());
    }
    metrics
}
