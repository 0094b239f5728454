//! One-call protocol runner.
//!
//! [`run_protocol`] initializes a driver, runs the whole sequence, releases
//! whatever the table still holds, and reports a [`RunStatus`] alongside
//! the report or the error. It never exits the process; the binary does
//! that with [`Outcome::status`].

use leakprobe_core::RuntimeProvider;
use leakprobe_harness::{HarnessError, LifecycleDriver, ProtocolConfig, RunReport};
use tracing::{debug, warn};

use crate::status::RunStatus;

/// Result of one protocol run.
#[derive(Debug)]
pub struct Outcome {
    /// Exit status for the run.
    pub status: RunStatus,
    /// The success report, or the error that ended the run.
    pub result: Result<RunReport, HarnessError>,
}

impl Outcome {
    /// Whether every checkpoint passed.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Diagnostic line for a failed run.
    pub fn diagnostic(&self) -> Option<String> {
        self.result.as_ref().err().map(|e| e.to_string())
    }
}

impl From<Result<RunReport, HarnessError>> for Outcome {
    fn from(result: Result<RunReport, HarnessError>) -> Self {
        let status = match &result {
            Ok(_) => RunStatus::Succeeded,
            Err(e) => RunStatus::from(e),
        };
        Self { status, result }
    }
}

/// Run the full protocol against `provider`.
pub fn run_protocol<P>(provider: P, config: ProtocolConfig) -> Outcome
where
    P: RuntimeProvider,
{
    let mut driver = match LifecycleDriver::initialize(provider, config) {
        Ok(driver) => driver,
        Err(e) => return Outcome::from(Err(e)),
    };
    let result = driver.run();
    let remaining = driver.table().occupied();
    drop(driver.teardown());
    debug!(remaining, "table released");
    let outcome = Outcome::from(result);
    if !outcome.is_success() {
        warn!(status = %outcome.status, "protocol failed");
    }
    outcome
}
