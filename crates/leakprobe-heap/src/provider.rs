//! One-shot construction of a [`TrackingHeap`].

use leakprobe_core::RuntimeProvider;
use tracing::debug;

use crate::config::HeapConfig;
use crate::error::HeapConfigError;
use crate::heap::TrackingHeap;

/// Builds a [`TrackingHeap`] from a validated [`HeapConfig`].
///
/// Leak finding is off by default; it must be switched on with
/// [`enable_leak_finding`](RuntimeProvider::enable_leak_finding) before
/// [`init`](RuntimeProvider::init) for audits to report anything.
#[derive(Clone, Debug)]
pub struct HeapProvider {
    config: HeapConfig,
    find_leaks: bool,
}

impl HeapProvider {
    /// Create a provider, validating `config`.
    pub fn new(config: HeapConfig) -> Result<Self, HeapConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            find_leaks: false,
        })
    }

    /// The configuration the heap will be created with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Whether leak finding is currently enabled.
    pub fn leak_finding(&self) -> bool {
        self.find_leaks
    }
}

impl Default for HeapProvider {
    fn default() -> Self {
        Self {
            config: HeapConfig::default(),
            find_leaks: false,
        }
    }
}

impl RuntimeProvider for HeapProvider {
    type Runtime = TrackingHeap;

    fn enable_leak_finding(&mut self, enabled: bool) {
        debug!(enabled, "leak finding configured");
        self.find_leaks = enabled;
    }

    fn init(self) -> TrackingHeap {
        TrackingHeap::new(self.config, self.find_leaks)
    }
}
