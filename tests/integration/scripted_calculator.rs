//! Scripted calculator for integration testing.
//!
//! Answers each invocation through a caller-supplied closure and keeps
//! every invocation it saw, so tests can assert on stage order and flags.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use equity_bot::calculator::{Calculator, Invocation, RawRun};

type Script = dyn Fn(&Invocation) -> Result<RawRun> + Send + Sync;

pub struct ScriptedCalculator {
    script: Box<Script>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl ScriptedCalculator {
    pub fn new(script: impl Fn(&Invocation) -> Result<RawRun> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always print the same exact-run output.
    pub fn exact(stdout: &'static str) -> Self {
        Self::new(move |_| Ok(RawRun::success(stdout)))
    }

    /// Fail every run as if the process could not be spawned.
    pub fn broken() -> Self {
        Self::new(|_| Err(anyhow!("No such file or directory (os error 2)")))
    }

    /// Shared handle on the recorded invocations.
    pub fn invocations(&self) -> Arc<Mutex<Vec<Invocation>>> {
        self.invocations.clone()
    }
}

#[async_trait]
impl Calculator for ScriptedCalculator {
    async fn run(&self, invocation: &Invocation) -> Result<RawRun> {
        self.invocations.lock().unwrap().push(invocation.clone());
        (self.script)(invocation)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Sleeps on every run and remembers how many runs overlapped at most.
pub struct SlowCalculator {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

impl SlowCalculator {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn peak(&self) -> Arc<AtomicUsize> {
        self.peak.clone()
    }
}

#[async_trait]
impl Calculator for SlowCalculator {
    async fn run(&self, _invocation: &Invocation) -> Result<RawRun> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(RawRun::success("0\nAA: 81.95%\nKK: 18.05%\n"))
    }

    fn name(&self) -> &str {
        "slow"
    }
}
