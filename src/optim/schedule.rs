//! Learning-rate schedules over fractional epochs.
//!
//! A schedule is a pure function `lr(t)` of the fractional epoch
//! `t = epoch + batch/num_batches`, so the learning rate can change
//! mid-epoch at per-batch granularity. The policy is fixed at startup.

use super::Optimizer;
use clap::ValueEnum;
use std::f64::consts::PI;

/// Named schedule shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchedulePolicy {
    /// Piecewise-linear through `(0, 0)`, `(2E/5, max)`, `(E, 0)`.
    Superconverge,
    /// `max` for the first half, `max/10` to three quarters, then `max/100`.
    Piecewise,
    /// Piecewise-linear through `(0, max)`, `(E/3, max)`, `(2E/3, max/10)`, `(E, max/100)`.
    Linear,
    /// `max` until the drop epoch, then a configured low value.
    Onedrop,
    /// `max − floor(t/(E/10))·(max/10)`.
    Multipledecay,
    /// `max · 0.5 · (1 + cos(t/E·π))`.
    Cosine,
}

/// A fully configured learning-rate schedule.
///
/// # Example
///
/// ```
/// use endurecer::optim::{LrSchedule, SchedulePolicy};
///
/// let schedule = LrSchedule::new(SchedulePolicy::Piecewise, 0.1, 100);
/// assert_eq!(schedule.lr(40.0), 0.1);
/// assert!((schedule.lr(60.0) - 0.01).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct LrSchedule {
    policy: SchedulePolicy,
    lr_max: f64,
    epochs: usize,
    drop_epoch: usize,
    lr_one_drop: f64,
}

impl LrSchedule {
    /// Create a schedule for a run of `epochs` epochs peaking at `lr_max`.
    pub fn new(policy: SchedulePolicy, lr_max: f64, epochs: usize) -> Self {
        Self { policy, lr_max, epochs, drop_epoch: epochs, lr_one_drop: lr_max / 10.0 }
    }

    /// Configure the one-drop policy's drop epoch and post-drop value.
    pub fn with_one_drop(mut self, drop_epoch: usize, lr_one_drop: f64) -> Self {
        self.drop_epoch = drop_epoch;
        self.lr_one_drop = lr_one_drop;
        self
    }

    /// Peak learning rate.
    pub fn lr_max(&self) -> f64 {
        self.lr_max
    }

    /// Learning rate at fractional epoch `t`. Pure.
    pub fn lr(&self, t: f64) -> f64 {
        let e = self.epochs as f64;
        let max = self.lr_max;
        match self.policy {
            SchedulePolicy::Superconverge => {
                interp(t, &[0.0, (self.epochs * 2 / 5) as f64, e], &[0.0, max, 0.0])
            }
            SchedulePolicy::Piecewise => {
                if t / e < 0.5 {
                    max
                } else if t / e < 0.75 {
                    max / 10.0
                } else {
                    max / 100.0
                }
            }
            SchedulePolicy::Linear => interp(
                t,
                &[0.0, (self.epochs / 3) as f64, (self.epochs * 2 / 3) as f64, e],
                &[max, max, max / 10.0, max / 100.0],
            ),
            SchedulePolicy::Onedrop => {
                if t < self.drop_epoch as f64 {
                    max
                } else {
                    self.lr_one_drop
                }
            }
            SchedulePolicy::Multipledecay => {
                let step = (self.epochs / 10).max(1) as f64;
                max - (t / step).floor() * (max / 10.0)
            }
            SchedulePolicy::Cosine => max * 0.5 * (1.0 + (t / e * PI).cos()),
        }
    }

    /// Apply the rate at `t` to an optimizer.
    pub fn apply<O: Optimizer>(&self, t: f64, optimizer: &mut O) {
        optimizer.set_lr(self.lr(t) as f32);
    }
}

/// Piecewise-linear interpolation through `(xs, ys)`, clamped at both ends.
fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if x <= xs[0] {
        return ys[0];
    }
    for i in 1..xs.len() {
        if x <= xs[i] {
            let span = xs[i] - xs[i - 1];
            if span == 0.0 {
                return ys[i];
            }
            let frac = (x - xs[i - 1]) / span;
            return ys[i - 1] + frac * (ys[i] - ys[i - 1]);
        }
    }
    ys[ys.len() - 1]
}
