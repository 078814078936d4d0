//! Host memory telemetry backed by `sysinfo`

use std::sync::Mutex;

use docdiff_core::guard::{SystemTelemetry, TelemetryProvider};
use sysinfo::System;

/// Reads available memory from the operating system on every snapshot
///
/// Platforms where `sysinfo` cannot determine available memory report 0;
/// that is surfaced as "unknown" rather than "no memory".
pub struct SysinfoTelemetry {
    system: Mutex<System>,
}

impl SysinfoTelemetry {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryProvider for SysinfoTelemetry {
    fn snapshot(&self) -> SystemTelemetry {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_memory();
        match system.available_memory() {
            0 => SystemTelemetry::UNKNOWN,
            bytes => SystemTelemetry::with_available_memory(bytes),
        }
    }
}

impl std::fmt::Debug for SysinfoTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoTelemetry").finish_non_exhaustive()
    }
}
