//! # Validate Subcommand
//!
//! Assembles a behavior file and reports every construction defect found,
//! without running anything.
//!
//! ```bash
//! skillflow validate behaviors/serve_drinks.yaml
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use crate::assemble::assemble;
use crate::config::BehaviorFile;

/// Arguments for `skillflow validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Behavior file to check.
    pub path: PathBuf,
}

/// Execute the validate subcommand. Returns 0 when the behavior is
/// well-formed and 1 when it has defects.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let (code, report) = validate_file(&args.path)?;
    print!("{report}");
    Ok(code)
}

fn validate_file(path: &Path) -> Result<(u8, String)> {
    let file = BehaviorFile::load(path)?;
    match assemble(&file) {
        Ok(assembly) => {
            let states = assembly.machine.state_names().count();
            tracing::info!(machine = %assembly.machine.name(), states, "behavior is valid");
            Ok((
                0,
                format!(
                    "OK: {} ({states} states, initial {})\n",
                    assembly.machine.name(),
                    assembly.machine.initial_state()
                ),
            ))
        }
        Err(e) => {
            let mut report = format!(
                "FAIL: {} has {} defect(s)\n",
                e.machine,
                e.defects.len()
            );
            for defect in &e.defects {
                tracing::debug!(%defect, "construction defect");
                report.push_str(&format!("  - {defect}\n"));
            }
            Ok((1, report))
        }
    }
}
