//! Operator commands
//!
//! The operator types single-letter commands on stdin while the camera runs:
//! `t` arms the trigger, `r` records free-run, `q` quits, `h` prints help.

pub mod console;
pub mod listener;

pub use console::OperatorConsole;
pub use listener::CommandListener;

use std::str::FromStr;
use thiserror::Error;

/// Short help shown on `h`
pub const HELP: &str = "Commands: t=triggered record, r=free-run record, q=quit, h=help";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown command: {0:?}. Type 'h' for help.")]
pub struct UnknownCommand(pub String);

/// A parsed operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Arm the trigger and record once on the rising edge
    ArmTrigger,
    /// Record immediately in free-run
    RecordFreeRun,
    Quit,
    Help,
}

impl FromStr for OperatorCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "t" => Ok(OperatorCommand::ArmTrigger),
            "r" => Ok(OperatorCommand::RecordFreeRun),
            "q" => Ok(OperatorCommand::Quit),
            "h" => Ok(OperatorCommand::Help),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}
