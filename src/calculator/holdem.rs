//! `holdem-eval` process adapter.
//!
//! Runs the calculator binary once per invocation with stdout and stderr
//! captured through pipes owned by that invocation, so concurrent runs
//! never share an output handle.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use super::{Calculator, Invocation, RawRun};

const CALCULATOR_NAME: &str = "holdem-eval";

/// Calculator backed by a local `holdem-eval` executable.
pub struct HoldemEval {
    executable: PathBuf,
    /// Optional program prefix (`nice -n 10`, a shell wrapper, ...).
    launcher: Vec<String>,
}

impl HoldemEval {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            launcher: Vec::new(),
        }
    }

    /// Run the executable through another program. The first element is
    /// the program, the rest are passed before the executable path.
    pub fn with_launcher(mut self, launcher: Vec<String>) -> Self {
        self.launcher = launcher;
        self
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = match self.launcher.split_first() {
            Some((program, prefix)) => {
                let mut c = Command::new(program);
                c.args(prefix);
                c.arg(&self.executable);
                c
            }
            None => Command::new(&self.executable),
        };
        cmd.args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Calculator for HoldemEval {
    async fn run(&self, invocation: &Invocation) -> Result<RawRun> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();

        debug!(
            %run_id,
            executable = %self.executable.display(),
            args = ?invocation.args(),
            "Spawning calculator"
        );

        let output = self
            .command(invocation)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        let run = RawRun {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            %run_id,
            exit_code = ?run.exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            stdout_bytes = run.stdout.len(),
            "Calculator finished"
        );

        Ok(run)
    }

    fn name(&self) -> &str {
        CALCULATOR_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
