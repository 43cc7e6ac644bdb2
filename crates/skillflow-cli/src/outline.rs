//! # Outline Subcommand
//!
//! Prints the structure of an assembled behavior: every state, its kind,
//! and where each of its outcomes leads, including nested machines.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::assemble::assemble;
use crate::config::BehaviorFile;

/// Arguments for `skillflow outline`.
#[derive(Args, Debug)]
pub struct OutlineArgs {
    /// Behavior file to describe.
    pub path: PathBuf,

    /// Emit JSON instead of an indented tree.
    #[arg(long)]
    pub json: bool,
}

/// Execute the outline subcommand.
pub fn run_outline(args: &OutlineArgs) -> Result<u8> {
    print!("{}", render_outline(args)?);
    Ok(0)
}

fn render_outline(args: &OutlineArgs) -> Result<String> {
    let file = BehaviorFile::load(&args.path)?;
    let assembly = assemble(&file)
        .with_context(|| format!("failed to assemble {}", args.path.display()))?;
    let outline = assembly.machine.outline();
    if args.json {
        let mut rendered = serde_json::to_string_pretty(&outline)?;
        rendered.push('\n');
        Ok(rendered)
    } else {
        Ok(outline.to_string())
    }
}
