//! Checkpoint persistence and best-model tracking.
//!
//! Layout inside the run directory: `model_<epoch>.json` / `opt_<epoch>.json`
//! at periodic boundaries, plus a single `model_best.json` overwritten
//! whenever test-robust accuracy strictly improves.

use super::state::{read_json, write_json, ModelState};
use crate::model::Classifier;
use crate::optim::{Sgd, SgdState};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The four test-metric scalars stored beside the best snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestMetrics {
    /// Mean clean test loss.
    pub test_loss: f64,
    /// Clean test accuracy.
    pub test_acc: f64,
    /// Mean adversarial test loss.
    pub test_robust_loss: f64,
    /// Adversarial test accuracy.
    pub test_robust_acc: f64,
}

/// Contents of `model_best.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestSnapshot {
    /// Model state at the best epoch.
    pub state: ModelState,
    /// Test metrics of that epoch.
    pub metrics: TestMetrics,
}

/// Persists model/optimizer state and tracks the best robust accuracy.
pub struct CheckpointManager {
    dir: PathBuf,
    chkpt_iters: usize,
    best_test_robust_acc: f64,
}

impl CheckpointManager {
    /// Create a manager rooted at `dir`, creating the directory if needed.
    ///
    /// `chkpt_iters` is the periodic-save interval in epochs.
    pub fn new(dir: &Path, chkpt_iters: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| crate::Error::io(format!("creating {}", dir.display()), e))?;
        Ok(Self { dir: dir.to_path_buf(), chkpt_iters: chkpt_iters.max(1), best_test_robust_acc: 0.0 })
    }

    /// Path of the model snapshot for an epoch.
    pub fn model_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_{epoch}.json"))
    }

    /// Path of the optimizer snapshot for an epoch.
    pub fn opt_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("opt_{epoch}.json"))
    }

    /// Path of the best-model snapshot.
    pub fn best_path(&self) -> PathBuf {
        self.dir.join("model_best.json")
    }

    /// Best test-robust accuracy seen so far (or restored on resume).
    pub fn best_acc(&self) -> f64 {
        self.best_test_robust_acc
    }

    /// Persist model and optimizer state if this epoch sits on a periodic
    /// boundary or is the final one. Returns whether a save happened.
    pub fn save_periodic<C: Classifier>(
        &self,
        model: &C,
        optimizer: &Sgd,
        epoch: usize,
        total_epochs: usize,
    ) -> Result<bool> {
        if (epoch + 1) % self.chkpt_iters != 0 && epoch + 1 != total_epochs {
            return Ok(false);
        }
        ModelState::snapshot(model).save(&self.model_path(epoch))?;
        write_json(&optimizer.state(), &self.opt_path(epoch))?;
        Ok(true)
    }

    /// Overwrite the best snapshot when robust accuracy strictly improves.
    ///
    /// Non-improving epochs leave the file untouched, so repeated plateaus
    /// are idempotent. Returns whether the snapshot was replaced.
    pub fn save_best_if_improved<C: Classifier>(
        &mut self,
        model: &C,
        metrics: &TestMetrics,
    ) -> Result<bool> {
        if metrics.test_robust_acc <= self.best_test_robust_acc {
            return Ok(false);
        }
        let snapshot = BestSnapshot { state: ModelState::snapshot(model), metrics: *metrics };
        write_json(&snapshot, &self.best_path())?;
        self.best_test_robust_acc = metrics.test_robust_acc;
        Ok(true)
    }

    /// Resume a prior run at `start_epoch`.
    ///
    /// Loads model and optimizer state saved for `start_epoch − 1` and the
    /// recorded best robust accuracy from the best snapshot. Any missing
    /// file is fatal.
    pub fn resume<C: Classifier>(
        &mut self,
        model: &mut C,
        optimizer: &mut Sgd,
        start_epoch: usize,
    ) -> Result<()> {
        let prev = start_epoch.saturating_sub(1);
        ModelState::load(&self.model_path(prev))?.restore(model)?;
        let opt_state: SgdState = read_json(&self.opt_path(prev))?;
        optimizer.load_state(&opt_state)?;
        let best: BestSnapshot = read_json(&self.best_path())?;
        self.best_test_robust_acc = best.metrics.test_robust_acc;
        Ok(())
    }
}
