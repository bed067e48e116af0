//! endurecer CLI
//!
//! Single-command training entry point for the endurecer library.
//!
//! # Usage
//!
//! ```bash
//! # Train against one attack's artifacts
//! endurecer --attack pgd --epochs 110
//!
//! # Concatenate a subset of attacks, proportionally resampled
//! endurecer --attack combine --list pgd_fgsm_bim --balanced 9_1_1
//!
//! # Report metrics on a saved checkpoint
//! endurecer --attack pgd --resume 100 --eval
//! ```

use clap::Parser;
use endurecer::config::{Cli, RunConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match RunConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match endurecer::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
