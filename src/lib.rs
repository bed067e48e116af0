//! Adversarial-robustness training on pre-computed attack artifacts.
//!
//! endurecer trains an image classifier against clean data and pre-computed
//! adversarial examples at once: each step pairs a clean batch with an
//! adversarial batch positionally, drives the gradient from the robust loss
//! (optionally mixup-blended, optionally L1/L2-regularized), and measures
//! clean metrics with the freshly-updated weights. Per-epoch test metrics
//! feed a checkpoint manager that keeps periodic snapshots and the
//! best-robust-accuracy model.
//!
//! The classifier is a capability interface ([`model::Classifier`]); the
//! crate ships a small linear reference implementation, and any architecture
//! satisfying the trait is substitutable.
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use endurecer::config::{Cli, RunConfig};
//!
//! let cli = Cli::parse_from(["endurecer", "--attack", "pgd", "--epochs", "10"]);
//! let config = RunConfig::from_cli(cli)?;
//! endurecer::run(config)?;
//! # Ok::<(), endurecer::Error>(())
//! ```

pub mod config;
pub mod data;
pub mod io;
pub mod logging;
pub mod model;
pub mod optim;
pub mod run;
pub mod train;

mod error;
mod param;

pub use error::{Error, Result};
pub use param::Param;
pub use run::run;
