//! # Run Subcommand
//!
//! Assembles a behavior file and executes it against its scripted
//! capabilities, printing every transition and the final outcome.
//!
//! A run can be preempted after a delay with `--preempt-after-ms`, which
//! raises the root machine's preemption signal from a second thread.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use skillflow_core::KeyName;
use skillflow_machine::{ExecutionError, TransitionRecord, Userdata};

use crate::assemble::assemble;
use crate::config::BehaviorFile;

/// Arguments for `skillflow run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Behavior file to execute.
    pub path: PathBuf,

    /// Emit a JSON report instead of text.
    #[arg(long)]
    pub json: bool,

    /// Request preemption this many milliseconds after the run starts.
    #[arg(long)]
    pub preempt_after_ms: Option<u64>,
}

/// What a run did.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub machine: String,
    /// The machine outcome, or `None` when the run stopped with an error.
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub transitions: Vec<TransitionRecord>,
    pub userdata: Userdata,
    /// Invocation count per scripted capability.
    pub invocations: BTreeMap<String, usize>,
}

/// Execute the run subcommand.
///
/// Exit codes: 0 when the machine reached an outcome, 2 when it was
/// preempted without declaring a `preempted` outcome. Any other execution
/// error is reported as a failure.
pub fn run_run(args: &RunArgs) -> Result<u8> {
    let (code, report) = execute(args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for record in &report.transitions {
            println!("{record}");
        }
        match (&report.outcome, &report.error) {
            (Some(outcome), _) => println!("outcome: {outcome}"),
            (None, Some(error)) => println!("stopped: {error}"),
            (None, None) => {}
        }
        for (key, value) in report.userdata.iter() {
            println!("  {key} = {value}");
        }
    }
    Ok(code)
}

fn execute(args: &RunArgs) -> Result<(u8, RunReport)> {
    let file = BehaviorFile::load(&args.path)?;
    let mut assembly = assemble(&file)
        .with_context(|| format!("failed to assemble {}", args.path.display()))?;

    let mut userdata = Userdata::new();
    for (key, value) in &file.userdata {
        let key = KeyName::new(key.as_str())
            .with_context(|| format!("invalid userdata key {key:?}"))?;
        userdata.insert(key, value.clone());
    }

    if let Some(ms) = args.preempt_after_ms {
        let signal = assembly.machine.preempt_signal();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(ms));
            signal.request();
        });
    }

    tracing::info!(machine = %assembly.machine.name(), "run started");
    let result = assembly.machine.run(&mut userdata);

    let (code, outcome, error) = match result {
        Ok(outcome) => (0, Some(outcome.to_string()), None),
        Err(e @ ExecutionError::Preempted { .. }) => (2, None, Some(e.to_string())),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("machine {} faulted", assembly.machine.name())))
        }
    };

    let report = RunReport {
        machine: assembly.machine.name().to_string(),
        outcome,
        error,
        transitions: assembly.machine.history().to_vec(),
        userdata,
        invocations: assembly
            .capabilities
            .iter()
            .map(|(name, capability)| (name.clone(), capability.invocations().len()))
            .collect(),
    };
    Ok((code, report))
}
