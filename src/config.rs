//! CLI surface and the validated run configuration derived from it.

use crate::data::AttackPolicy;
use crate::optim::SchedulePolicy;
use crate::{Error, Result};
use clap::Parser;
use std::path::PathBuf;

/// Train an image classifier against pre-computed adversarial examples.
#[derive(Parser, Debug, Clone)]
#[command(name = "endurecer")]
#[command(version)]
#[command(about = "Adversarial-robustness training on pre-computed attack artifacts")]
pub struct Cli {
    /// Attack whose examples to train against: a single name, `all`, or `combine`
    #[arg(long, default_value = "pgd")]
    pub attack: String,

    /// Underscore-separated attack subset used by `combine`
    #[arg(long, default_value = "newtonfool_pixelattack_spatialtransformation")]
    pub list: String,

    /// Underscore-separated integer ratios for balanced resampling, e.g. 9_1_1
    #[arg(long)]
    pub balanced: Option<String>,

    /// Percentage of the training sets kept after seeded shuffling
    #[arg(long, default_value_t = 100.0)]
    pub sample: f64,

    /// Weight-decay coefficient; bn/bias parameters are excluded when set
    #[arg(long, default_value_t = 0.0)]
    pub l2: f32,

    /// L1 coefficient over non-bn, non-bias parameters
    #[arg(long, default_value_t = 0.0)]
    pub l1: f32,

    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Directory holding clean splits and `adv_examples/<attack>/` artifacts
    #[arg(long, default_value = "cifar-data")]
    pub data_dir: PathBuf,

    #[arg(long, default_value_t = 110)]
    pub epochs: usize,

    #[arg(long, value_enum, default_value = "piecewise")]
    pub lr_schedule: SchedulePolicy,

    #[arg(long, default_value_t = 0.1)]
    pub lr_max: f64,

    /// Post-drop rate for the onedrop schedule
    #[arg(long, default_value_t = 0.01)]
    pub lr_one_drop: f64,

    /// Drop epoch for the onedrop schedule
    #[arg(long, default_value_t = 100)]
    pub lr_drop_epoch: usize,

    /// Attack budget in 1/255 pixel steps, recorded with the run
    #[arg(long, default_value_t = 8)]
    pub epsilon: u32,

    /// PGD step size in 1/255 pixel steps, recorded with the run
    #[arg(long, default_value_t = 2.0)]
    pub pgd_alpha: f64,

    /// Root directory for checkpoints and logs
    #[arg(long, default_value = "trained_models")]
    pub fname: PathBuf,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Resume at this epoch, loading the checkpoints saved for the one before
    #[arg(long, default_value_t = 0)]
    pub resume: usize,

    /// Blend clean batches with mixup
    #[arg(long)]
    pub mixup: bool,

    /// Mixup Beta concentration; required with --mixup
    #[arg(long)]
    pub mixup_alpha: Option<f64>,

    /// Measure metrics on a resumed checkpoint without training
    #[arg(long)]
    pub eval: bool,

    /// Epoch interval between periodic checkpoints
    #[arg(long, default_value_t = 20)]
    pub chkpt_iters: usize,
}

/// Validated configuration for one run.
///
/// Every randomness source derives from `seed`; there is no ambient global
/// seeding anywhere in the crate.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Attack selector as typed, used for the run directory name.
    pub attack_label: String,
    /// Validated assembly policy.
    pub policy: AttackPolicy,
    /// Training-set sampling percentage.
    pub sample: f64,
    /// Weight-decay coefficient (0 = optimizer default decay).
    pub l2: f32,
    /// L1 coefficient (0 = off).
    pub l1: f32,
    /// Batch size for every source.
    pub batch_size: usize,
    /// Directory holding clean and adversarial artifacts.
    pub data_dir: PathBuf,
    /// Total epochs.
    pub epochs: usize,
    /// Schedule shape.
    pub lr_schedule: SchedulePolicy,
    /// Peak learning rate.
    pub lr_max: f64,
    /// Post-drop rate for onedrop.
    pub lr_one_drop: f64,
    /// Drop epoch for onedrop.
    pub lr_drop_epoch: usize,
    /// Attack budget as a fraction of the pixel range.
    pub epsilon: f64,
    /// PGD step size as a fraction of the pixel range.
    pub pgd_alpha: f64,
    /// Root output directory.
    pub out_dir: PathBuf,
    /// Seed for every RNG in the run.
    pub seed: u64,
    /// Epoch to resume at, if any.
    pub resume: Option<usize>,
    /// Mixup concentration, present when blending is on.
    pub mixup_alpha: Option<f64>,
    /// Skip weight updates; reporting only.
    pub eval: bool,
    /// Periodic checkpoint interval.
    pub chkpt_iters: usize,
}

impl RunConfig {
    /// Validate the raw CLI surface.
    ///
    /// Unknown attack names and inconsistent flags fail here, before any
    /// training state exists.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let policy = AttackPolicy::from_args(&cli.attack, &cli.list, cli.balanced.as_deref())?;
        if !(cli.sample > 0.0 && cli.sample <= 100.0) {
            return Err(Error::config("sample", "percentage must be in (0, 100]"));
        }
        if cli.batch_size == 0 {
            return Err(Error::config("batch-size", "must be positive"));
        }
        if cli.chkpt_iters == 0 {
            return Err(Error::config("chkpt-iters", "must be positive"));
        }
        let mixup_alpha = match (cli.mixup, cli.mixup_alpha) {
            (false, _) => None,
            (true, Some(alpha)) => Some(alpha),
            (true, None) => {
                return Err(Error::config("mixup-alpha", "--mixup requires --mixup-alpha"))
            }
        };
        Ok(Self {
            attack_label: cli.attack,
            policy,
            sample: cli.sample,
            l2: cli.l2,
            l1: cli.l1,
            batch_size: cli.batch_size,
            data_dir: cli.data_dir,
            epochs: cli.epochs,
            lr_schedule: cli.lr_schedule,
            lr_max: cli.lr_max,
            lr_one_drop: cli.lr_one_drop,
            lr_drop_epoch: cli.lr_drop_epoch,
            epsilon: f64::from(cli.epsilon) / 255.0,
            pgd_alpha: cli.pgd_alpha / 255.0,
            out_dir: cli.fname,
            seed: cli.seed,
            resume: (cli.resume > 0).then_some(cli.resume),
            mixup_alpha,
            eval: cli.eval,
            chkpt_iters: cli.chkpt_iters,
        })
    }

    /// Run directory: `<out>/default/<attack>/` at full sampling, otherwise
    /// `<out>/<pct>/<attack>/`.
    pub fn run_dir(&self) -> PathBuf {
        let bucket =
            if self.sample >= 100.0 { "default".to_string() } else { format_pct(self.sample) };
        self.out_dir.join(bucket).join(&self.attack_label)
    }

    /// Log file name beside the checkpoints.
    pub fn log_name(&self) -> &'static str {
        if self.eval {
            "eval.log"
        } else {
            "output.log"
        }
    }
}

fn format_pct(pct: f64) -> String {
    if pct.fract() == 0.0 {
        format!("{}", pct as u64)
    } else {
        format!("{pct}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("endurecer").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_match_contract() {
        let cli = parse(&[]);
        assert_eq!(cli.attack, "pgd");
        assert_eq!(cli.batch_size, 128);
        assert_eq!(cli.epochs, 110);
        assert_eq!(cli.lr_schedule, SchedulePolicy::Piecewise);
        assert_eq!(cli.chkpt_iters, 20);
    }

    #[test]
    fn test_unknown_attack_fails_before_any_state() {
        let cli = parse(&["--attack", "ddn"]);
        assert!(matches!(RunConfig::from_cli(cli), Err(Error::UnknownAttack { .. })));
    }

    #[test]
    fn test_mixup_requires_alpha() {
        let cli = parse(&["--mixup"]);
        assert!(matches!(RunConfig::from_cli(cli), Err(Error::ConfigValue { .. })));
        let cli = parse(&["--mixup", "--mixup-alpha", "1.0"]);
        assert_eq!(RunConfig::from_cli(cli).unwrap().mixup_alpha, Some(1.0));
    }

    #[test]
    fn test_resume_zero_means_fresh_run() {
        assert_eq!(RunConfig::from_cli(parse(&[])).unwrap().resume, None);
        assert_eq!(RunConfig::from_cli(parse(&["--resume", "5"])).unwrap().resume, Some(5));
    }

    #[test]
    fn test_run_dir_buckets_by_sampling() {
        let full = RunConfig::from_cli(parse(&["--fname", "out"])).unwrap();
        assert_eq!(full.run_dir(), PathBuf::from("out/default/pgd"));

        let half = RunConfig::from_cli(parse(&["--fname", "out", "--sample", "50"])).unwrap();
        assert_eq!(half.run_dir(), PathBuf::from("out/50/pgd"));

        let frac = RunConfig::from_cli(parse(&["--fname", "out", "--sample", "12.5"])).unwrap();
        assert_eq!(frac.run_dir(), PathBuf::from("out/12.5/pgd"));
    }

    #[test]
    fn test_log_name_tracks_eval() {
        assert_eq!(RunConfig::from_cli(parse(&[])).unwrap().log_name(), "output.log");
        assert_eq!(RunConfig::from_cli(parse(&["--eval"])).unwrap().log_name(), "eval.log");
    }

    #[test]
    fn test_epsilon_scaled_to_pixel_range() {
        let config = RunConfig::from_cli(parse(&["--epsilon", "8"])).unwrap();
        assert!((config.epsilon - 8.0 / 255.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_bounds_checked() {
        assert!(RunConfig::from_cli(parse(&["--sample", "0"])).is_err());
        assert!(RunConfig::from_cli(parse(&["--sample", "101"])).is_err());
    }
}
