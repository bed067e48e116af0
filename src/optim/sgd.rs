//! Stochastic Gradient Descent with momentum and per-group weight decay.

use super::Optimizer;
use crate::Param;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Weight decay applied when no explicit L2 coefficient is configured.
pub const DEFAULT_WEIGHT_DECAY: f32 = 5e-4;

/// Momentum coefficient used by the training loop.
pub const MOMENTUM: f32 = 0.9;

/// A set of parameters sharing one weight-decay coefficient.
pub struct ParamGroup {
    /// Parameters in the group (clones sharing storage with the model).
    pub params: Vec<Param>,
    /// L2 coefficient added to gradients as `wd * w`.
    pub weight_decay: f32,
}

/// Whether a parameter participates in weight decay and L1 regularization.
///
/// Batch-norm and bias parameters are excluded by name.
pub fn decay_eligible(name: &str) -> bool {
    !name.contains("bn") && !name.contains("bias")
}

/// Split named parameters into decay / no-decay groups.
///
/// With `l2 > 0`, batch-norm and bias parameters are excluded from decay;
/// otherwise a single group carries [`DEFAULT_WEIGHT_DECAY`].
pub fn decay_param_groups(named: &[(String, Param)], l2: f32) -> Vec<ParamGroup> {
    if l2 > 0.0 {
        let (decay, no_decay): (Vec<_>, Vec<_>) =
            named.iter().partition(|(name, _)| decay_eligible(name));
        vec![
            ParamGroup { params: decay.into_iter().map(|(_, p)| p.clone()).collect(), weight_decay: l2 },
            ParamGroup {
                params: no_decay.into_iter().map(|(_, p)| p.clone()).collect(),
                weight_decay: 0.0,
            },
        ]
    } else {
        vec![ParamGroup {
            params: named.iter().map(|(_, p)| p.clone()).collect(),
            weight_decay: DEFAULT_WEIGHT_DECAY,
        }]
    }
}

/// SGD with momentum over parameter groups.
///
/// Update per parameter: `g ← grad + wd·w`, `v ← momentum·v + g`,
/// `w ← w − lr·v` (plain `w ← w − lr·g` without momentum).
pub struct Sgd {
    groups: Vec<ParamGroup>,
    lr: f32,
    momentum: f32,
    velocities: Vec<Vec<Option<Array1<f32>>>>,
}

/// Serializable optimizer state for checkpointing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgdState {
    /// Momentum coefficient at save time.
    pub momentum: f32,
    /// Momentum buffers per group, per parameter; empty vec = not yet built.
    pub velocities: Vec<Vec<Vec<f32>>>,
}

impl Sgd {
    /// Create an optimizer over the given groups.
    pub fn new(groups: Vec<ParamGroup>, lr: f32, momentum: f32) -> Self {
        let velocities = groups.iter().map(|g| vec![None; g.params.len()]).collect();
        Self { groups, lr, momentum, velocities }
    }

    /// Snapshot momentum state for checkpointing.
    pub fn state(&self) -> SgdState {
        SgdState {
            momentum: self.momentum,
            velocities: self
                .velocities
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|v| v.as_ref().map(|a| a.to_vec()).unwrap_or_default())
                        .collect()
                })
                .collect(),
        }
    }

    /// Restore momentum state from a checkpoint.
    pub fn load_state(&mut self, state: &SgdState) -> crate::Result<()> {
        if state.velocities.len() != self.groups.len() {
            return Err(crate::Error::Serialization {
                message: format!(
                    "optimizer state has {} groups, expected {}",
                    state.velocities.len(),
                    self.groups.len()
                ),
            });
        }
        self.momentum = state.momentum;
        for (gi, group) in state.velocities.iter().enumerate() {
            if group.len() != self.groups[gi].params.len() {
                return Err(crate::Error::Serialization {
                    message: format!(
                        "optimizer group {gi} has {} buffers, expected {}",
                        group.len(),
                        self.groups[gi].params.len()
                    ),
                });
            }
            for (pi, buf) in group.iter().enumerate() {
                self.velocities[gi][pi] =
                    if buf.is_empty() { None } else { Some(Array1::from(buf.clone())) };
            }
        }
        Ok(())
    }
}

impl Optimizer for Sgd {
    fn step(&mut self) {
        for (group, vels) in self.groups.iter().zip(self.velocities.iter_mut()) {
            for (param, vel) in group.params.iter().zip(vels.iter_mut()) {
                let Some(mut grad) = param.grad() else { continue };
                if group.weight_decay > 0.0 {
                    grad.scaled_add(group.weight_decay, &*param.data());
                }
                if self.momentum > 0.0 {
                    let v = match vel.take() {
                        Some(mut v) => {
                            v *= self.momentum;
                            v += &grad;
                            v
                        }
                        None => grad,
                    };
                    param.data_mut().scaled_add(-self.lr, &v);
                    *vel = Some(v);
                } else {
                    param.data_mut().scaled_add(-self.lr, &grad);
                }
            }
        }
    }

    fn zero_grad(&mut self) {
        for group in &self.groups {
            for param in &group.params {
                param.zero_grad();
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
