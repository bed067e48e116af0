//! The adversarial training loop.
//!
//! Each epoch pairs clean and adversarial batches positionally: the robust
//! loss on the adversarial batch drives the gradient step, then the clean
//! batch is forwarded with the already-updated weights for reporting only.
//! This ordering matches the reported numbers downstream tooling expects and
//! must not be reordered.

use super::evaluator::evaluate;
use super::loss::{correct_count, cross_entropy, mixup_cross_entropy};
use super::metrics::StreamMetrics;
use crate::data::{mixup, Batches, MixedBatch, Normalizer};
use crate::model::Classifier;
use crate::optim::{decay_eligible, LrSchedule, Optimizer, Sgd};
use rand::rngs::StdRng;

/// Knobs of the per-step loss.
#[derive(Debug, Clone, Copy)]
pub struct TrainSettings {
    /// Mixup concentration; `Some(α)` blends every clean batch.
    pub mixup_alpha: Option<f64>,
    /// L1 coefficient over non-bn, non-bias parameters; 0 disables.
    pub l1: f32,
    /// Measure metrics without updating weights.
    pub eval_only: bool,
}

/// Per-epoch training summary.
#[derive(Debug, Clone, Copy)]
pub struct EpochStats {
    /// Clean-batch loss/accuracy, measured with post-update weights.
    pub clean: StreamMetrics,
    /// Adversarial-batch loss/accuracy from the gradient-driving pass.
    pub robust: StreamMetrics,
    /// Learning rate of the last executed step.
    pub lr: f64,
}

/// Owns the classifier and optimizer state for the duration of a run.
pub struct Trainer<C: Classifier> {
    model: C,
    normalizer: Normalizer,
    optimizer: Sgd,
    schedule: LrSchedule,
    settings: TrainSettings,
    rng: StdRng,
}

impl<C: Classifier> Trainer<C> {
    /// Assemble a trainer; the optimizer must already hold the model's
    /// parameter groups.
    pub fn new(
        model: C,
        normalizer: Normalizer,
        optimizer: Sgd,
        schedule: LrSchedule,
        settings: TrainSettings,
        rng: StdRng,
    ) -> Self {
        Self { model, normalizer, optimizer, schedule, settings, rng }
    }

    /// The wrapped classifier.
    pub fn model(&self) -> &C {
        &self.model
    }

    /// The wrapped optimizer.
    pub fn optimizer(&self) -> &Sgd {
        &self.optimizer
    }

    /// One pass over the positionally-paired clean/adversarial batches.
    ///
    /// Traversal stops at whichever source exhausts first; mismatched batch
    /// counts shorten the effective epoch rather than erroring. Under
    /// `eval_only` no step executes and the returned metrics are empty.
    pub fn train_epoch(&mut self, epoch: usize, clean: &Batches, adv: &Batches) -> EpochStats {
        self.model.set_train_mode(true);
        let num_batches = clean.len();
        let mut clean_metrics = StreamMetrics::new();
        let mut robust_metrics = StreamMetrics::new();
        let mut lr = self.schedule.lr(epoch as f64);

        let clean_iter = clean.iter(&mut self.rng);
        let adv_iter = adv.iter(&mut self.rng);
        for (i, (batch, adv_batch)) in clean_iter.zip(adv_iter).enumerate() {
            if self.settings.eval_only {
                break;
            }

            // mixup blends the clean batch; the adversarial input stays
            // unblended but its loss uses the blended label pair
            let mixed: Option<MixedBatch> =
                self.settings.mixup_alpha.map(|alpha| mixup(&batch, alpha, &mut self.rng));

            lr = self.schedule.lr(epoch as f64 + (i + 1) as f64 / num_batches as f64);
            self.optimizer.set_lr(lr as f32);

            let adv_input = self.normalizer.apply(&adv_batch.input);
            let robust_logits = self.model.forward(&adv_input);
            // the robust loss targets the clean batch's labels: pairing is
            // positional, so they coincide with the adversarial labels when
            // the sets are aligned
            let (mut robust_loss, robust_grad) = match &mixed {
                Some(m) => mixup_cross_entropy(&robust_logits, &m.target_a, &m.target_b, m.lam),
                None => cross_entropy(&robust_logits, &batch.target),
            };
            if self.settings.l1 > 0.0 {
                for (name, param) in &self.model.named_parameters() {
                    if decay_eligible(name) {
                        robust_loss += self.settings.l1 * param.l1_norm();
                    }
                }
            }

            self.optimizer.zero_grad();
            self.model.backward(&robust_grad);
            if self.settings.l1 > 0.0 {
                for (name, param) in &self.model.named_parameters() {
                    if decay_eligible(name) {
                        let sign = param
                            .data()
                            .mapv(|v| if v == 0.0 { 0.0 } else { self.settings.l1 * v.signum() });
                        param.add_grad(&sign);
                    }
                }
            }
            self.optimizer.step();

            // clean forward with post-update weights, for reporting only
            let clean_input = match &mixed {
                Some(m) => self.normalizer.apply(&m.input),
                None => self.normalizer.apply(&batch.input),
            };
            let clean_logits = self.model.forward(&clean_input);
            let (clean_loss, _) = match &mixed {
                Some(m) => mixup_cross_entropy(&clean_logits, &m.target_a, &m.target_b, m.lam),
                None => cross_entropy(&clean_logits, &batch.target),
            };

            robust_metrics.add_loss(robust_loss, adv_batch.size());
            robust_metrics.add_correct(correct_count(&robust_logits, &adv_batch.target));
            // both train streams divide by the clean sample count
            robust_metrics.add_count(batch.size());
            clean_metrics.record(
                clean_loss,
                correct_count(&clean_logits, &batch.target),
                batch.size(),
            );
        }

        EpochStats { clean: clean_metrics, robust: robust_metrics, lr }
    }

    /// Inference-mode metrics over a full set.
    pub fn evaluate(&mut self, batches: &Batches) -> StreamMetrics {
        evaluate(&mut self.model, &self.normalizer, batches, &mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::model::LinearClassifier;
    use crate::optim::{decay_param_groups, SchedulePolicy, MOMENTUM};
    use approx::assert_abs_diff_eq;
    use ndarray::Array4;
    use rand::SeedableRng;

    fn toy_batches(n: usize, batch_size: usize) -> Batches {
        let images = Array4::from_shape_fn((n, 1, 2, 2), |(i, _, h, w)| {
            (i as f32 * 0.01 + h as f32 * 0.1 - w as f32 * 0.05).sin()
        });
        let labels: Vec<i64> = (0..n as i64).map(|i| i % 3).collect();
        Batches::new(Dataset::from_arrays(images, &labels).unwrap(), batch_size)
    }

    fn toy_trainer(settings: TrainSettings, lr_max: f64) -> Trainer<LinearClassifier> {
        let mut rng = StdRng::seed_from_u64(0);
        let model = LinearClassifier::new((1, 2, 2), 3, &mut rng);
        let optimizer = Sgd::new(decay_param_groups(&model.named_parameters(), 0.0), 0.0, MOMENTUM);
        let schedule = LrSchedule::new(SchedulePolicy::Piecewise, lr_max, 10);
        let normalizer = Normalizer::new(vec![0.0], vec![1.0]).unwrap();
        Trainer::new(model, normalizer, optimizer, schedule, settings, rng)
    }

    const PLAIN: TrainSettings = TrainSettings { mixup_alpha: None, l1: 0.0, eval_only: false };

    #[test]
    fn test_single_batch_runs_one_step() {
        let mut trainer = toy_trainer(PLAIN, 0.1);
        let before: Vec<f32> = trainer.model().named_parameters()[2].1.data().to_vec();
        let stats = trainer.train_epoch(0, &toy_batches(8, 8), &toy_batches(8, 8));
        let after: Vec<f32> = trainer.model().named_parameters()[2].1.data().to_vec();
        assert_ne!(before, after);
        assert_eq!(stats.clean.count(), 8);
        assert_eq!(stats.robust.count(), 8);
        // full last batch means t = epoch + 1
        assert_abs_diff_eq!(stats.lr, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_mismatched_sources_truncate_the_epoch() {
        let mut trainer = toy_trainer(PLAIN, 0.1);
        // clean has 3 batches, adversarial only 1
        let stats = trainer.train_epoch(0, &toy_batches(12, 4), &toy_batches(4, 4));
        assert_eq!(stats.clean.count(), 4);
        assert_eq!(stats.robust.count(), 4);
    }

    #[test]
    fn test_eval_only_leaves_weights_untouched() {
        let mut trainer =
            toy_trainer(TrainSettings { eval_only: true, ..PLAIN }, 0.1);
        let before: Vec<f32> = trainer.model().named_parameters()[2].1.data().to_vec();
        let stats = trainer.train_epoch(0, &toy_batches(8, 4), &toy_batches(8, 4));
        let after: Vec<f32> = trainer.model().named_parameters()[2].1.data().to_vec();
        assert_eq!(before, after);
        assert_eq!(stats.clean.count(), 0);
        assert_eq!(stats.clean.loss(), 0.0);
    }

    #[test]
    fn test_l1_term_raises_the_reported_robust_loss() {
        let l1 = 0.01_f32;
        let mut plain = toy_trainer(PLAIN, 0.0);
        let mut penalized = toy_trainer(TrainSettings { l1, ..PLAIN }, 0.0);
        // identical seed means identical initial parameters
        let expected_gap: f32 = penalized
            .model()
            .named_parameters()
            .iter()
            .filter(|(name, _)| decay_eligible(name))
            .map(|(_, p)| l1 * p.l1_norm())
            .sum();

        let a = plain.train_epoch(0, &toy_batches(4, 4), &toy_batches(4, 4));
        let b = penalized.train_epoch(0, &toy_batches(4, 4), &toy_batches(4, 4));
        assert_abs_diff_eq!(
            (b.robust.loss() - a.robust.loss()) as f32,
            expected_gap,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_mixup_epoch_completes_with_full_counts() {
        let mut trainer =
            toy_trainer(TrainSettings { mixup_alpha: Some(1.0), ..PLAIN }, 0.1);
        let stats = trainer.train_epoch(0, &toy_batches(12, 4), &toy_batches(12, 4));
        assert_eq!(stats.clean.count(), 12);
        assert!(stats.robust.loss() > 0.0);
    }

    #[test]
    fn test_lr_follows_schedule_mid_epoch() {
        // piecewise drops to max/10 past half the run
        let mut trainer = toy_trainer(PLAIN, 0.1);
        let stats = trainer.train_epoch(6, &toy_batches(4, 4), &toy_batches(4, 4));
        assert_abs_diff_eq!(stats.lr, 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_robust_accuracy_counts_adversarial_labels() {
        let mut trainer = toy_trainer(PLAIN, 0.1);
        let stats = trainer.train_epoch(0, &toy_batches(8, 8), &toy_batches(8, 8));
        assert!((0.0..=1.0).contains(&stats.robust.accuracy()));
    }
}
