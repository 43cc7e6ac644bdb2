//! # skillflow-cli — Behavior Files on the Command Line
//!
//! Provides the `skillflow` binary: load a YAML behavior file, assemble it
//! into a state machine through the same builders hand-written behaviors
//! use, then check it, describe it, or run it against scripted
//! capabilities.
//!
//! ## Subcommands
//!
//! - `skillflow validate <file>`: report every construction defect.
//! - `skillflow outline <file> [--json]`: print the state graph.
//! - `skillflow run <file> [--json] [--preempt-after-ms N]`: execute and
//!   print the transitions taken.
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; each subcommand module exposes an
//!   `Args` struct and a `run_*` handler returning an exit code.
//! - Handlers delegate to the library crates. No wiring rule is
//!   re-implemented here.

pub mod assemble;
pub mod config;
pub mod outline;
pub mod run;
pub mod validate;
