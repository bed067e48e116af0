//! The adversarial training loop, its criterion, and evaluation.

mod evaluator;
mod loss;
mod metrics;
mod trainer;

pub use evaluator::evaluate;
pub use loss::{correct_count, cross_entropy, mixup_cross_entropy};
pub use metrics::StreamMetrics;
pub use trainer::{EpochStats, TrainSettings, Trainer};
