//! Dataset assembly, batching, and input transforms.
//!
//! Clean and adversarial data travel as parallel, positionally-paired
//! sequences: raw dataset → [`Batches`] → ([`mixup`]) → [`Normalizer`] →
//! classifier.

mod adversarial;
mod artifact;
mod batch;
mod dataset;
mod mixup;
mod normalize;

pub use adversarial::{
    artifact_path, balanced_counts, is_known_attack, AttackPolicy, ATTACK_REGISTRY, EXTRA_ATTACKS,
};
pub use artifact::{ExampleSet, ADV_IMAGE_KEY, CLEAN_IMAGE_KEY, LABEL_KEY};
pub use batch::{Batch, BatchIter, Batches};
pub use dataset::{Dataset, Sample};
pub use mixup::{mixup, MixedBatch};
pub use normalize::{Normalizer, CIFAR10_MEAN, CIFAR10_STD};
