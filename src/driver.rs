//! The capture-and-retention loop.
//!
//! Every cycle enforces the storage budget first and captures second, so a
//! fresh screenshot is never evicted in the cycle that produced it. Failures
//! in either step are reported as values, logged with their code, and never
//! end the loop.

use crate::capture::{self, CaptureError, ScreenSource};
use crate::config::Config;
use crate::retention::{self, Enforcement, RetentionError, Usage};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// Numeric tags carried by error log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    Capture = 1,
    Eviction = 2,
    Measurement = 3,
}

impl FailureCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug)]
pub enum Failure {
    Measurement(RetentionError),
    Eviction(RetentionError),
    Capture(CaptureError),
}

impl Failure {
    pub fn code(&self) -> FailureCode {
        match self {
            Failure::Measurement(_) => FailureCode::Measurement,
            Failure::Eviction(_) => FailureCode::Eviction,
            Failure::Capture(_) => FailureCode::Capture,
        }
    }

    fn log(&self) {
        let code = self.code().as_u8();
        match self {
            Failure::Measurement(err) => error!(code, error = %err, "Storage measurement failed"),
            Failure::Eviction(err) => error!(code, error = %err, "Storage eviction failed"),
            Failure::Capture(err) => error!(code, error = %err, "Screenshot failed"),
        }
    }
}

/// What one Active phase did.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub evicted: Vec<PathBuf>,
    pub captured: Option<PathBuf>,
    pub failures: Vec<Failure>,
}

impl CycleReport {
    pub fn codes(&self) -> Vec<FailureCode> {
        self.failures.iter().map(Failure::code).collect()
    }

    /// Logs right away so log order follows cycle order.
    fn fail(&mut self, failure: Failure) {
        failure.log();
        self.failures.push(failure);
    }
}

/// Enforce the budget, then capture. Never fails; problems land in the report.
pub fn run_cycle(config: &Config, source: &impl ScreenSource) -> CycleReport {
    run_cycle_with(config, source, retention::enforce_budget)
}

fn run_cycle_with<E>(config: &Config, source: &impl ScreenSource, enforce: E) -> CycleReport
where
    E: FnOnce(&Path, u64) -> Result<Enforcement, RetentionError>,
{
    let mut report = CycleReport::default();

    match enforce(&config.storage_path, config.budget_mb) {
        Ok(enforcement) => {
            if let Usage::Unavailable { error, .. } = enforcement.usage {
                report.fail(Failure::Measurement(error));
            }
            if !enforcement.evicted.is_empty() {
                info!(count = enforcement.evicted.len(), "Evicted oldest screenshots");
            }
            report.evicted = enforcement.evicted;
        }
        Err(err) => report.fail(Failure::Eviction(err)),
    }

    match capture::capture(&config.storage_path, source) {
        Ok(path) => report.captured = Some(path),
        Err(err) => report.fail(Failure::Capture(err)),
    }
    report
}

/// Receiving half of a shutdown request.
pub struct Shutdown {
    rx: Receiver<()>,
}

/// Sending half; `trigger` asks the loop to stop at its next idle phase.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Sender<()>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = mpsc::channel();
    (ShutdownHandle { tx }, Shutdown { rx })
}

impl Shutdown {
    /// Sleep for `interval`; returns true if shutdown was requested.
    ///
    /// With every handle dropped nobody can ask to stop, so this is a plain sleep.
    pub fn wait(&self, interval: Duration) -> bool {
        match self.rx.recv_timeout(interval) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(interval);
                false
            }
        }
    }
}

/// Drives cycles until shutdown or, if set, a cycle limit.
pub struct Driver<'a, S: ScreenSource> {
    config: &'a Config,
    source: S,
    max_cycles: Option<u64>,
}

impl<'a, S: ScreenSource> Driver<'a, S> {
    pub fn new(config: &'a Config, source: S) -> Self {
        Driver {
            config,
            source,
            max_cycles: None,
        }
    }

    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Run the loop; returns the number of cycles completed.
    pub fn run(&self, shutdown: &Shutdown) -> u64 {
        let mut completed = 0u64;
        loop {
            let report = run_cycle(self.config, &self.source);
            completed += 1;
            debug!(
                cycle = completed,
                evicted = report.evicted.len(),
                captured = ?report.captured,
                failures = report.failures.len(),
                "Cycle finished"
            );

            if self.max_cycles.is_some_and(|max| completed >= max) {
                info!(cycles = completed, "Cycle limit reached, stopping");
                return completed;
            }
            if shutdown.wait(self.config.interval()) {
                info!(cycles = completed, "Shutdown requested, stopping");
                return completed;
            }
        }
    }
}
