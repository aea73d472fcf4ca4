//! Process resource sampling.
//!
//! CPU and resident memory of the current process, read through `sysinfo`.

use serde::Serialize;
use sysinfo::{get_current_pid, Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::warn;

/// Point-in-time process resource usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SystemMetrics {
    /// CPU usage in percent of one core since the previous sample
    pub cpu_usage: f64,
    /// Resident set size in bytes
    pub memory_usage: u64,
}

/// Samples the current process.
///
/// CPU usage is a delta, so the first sample after construction reports the
/// usage since `new`.
pub struct SystemSampler {
    system: System,
    pid: Option<Pid>,
    last: SystemMetrics,
}

impl std::fmt::Debug for SystemSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSampler")
            .field("pid", &self.pid)
            .field("last", &self.last)
            .finish()
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler {
    pub fn new() -> Self {
        let pid = match get_current_pid() {
            Ok(pid) => Some(pid),
            Err(err) => {
                warn!("Process sampling unavailable: {}", err);
                None
            }
        };
        let mut sampler = Self {
            system: System::new(),
            pid,
            last: SystemMetrics::default(),
        };
        // Prime the CPU baseline
        sampler.refresh();
        sampler
    }

    pub fn sample(&mut self) -> SystemMetrics {
        let Some(pid) = self.pid else {
            return self.last;
        };
        self.refresh();
        if let Some(process) = self.system.process(pid) {
            self.last = SystemMetrics {
                cpu_usage: f64::from(process.cpu_usage()),
                memory_usage: process.memory(),
            };
        }
        self.last
    }

    pub fn last(&self) -> SystemMetrics {
        self.last
    }

    fn refresh(&mut self) {
        let Some(pid) = self.pid else {
            return;
        };
        let targets = [pid];
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&targets),
            false,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
    }
}
