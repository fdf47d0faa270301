//! Host resource probes

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

/// Point-in-time host resource readings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Percent, averaged over all cores
    pub cpu_usage: Option<f64>,
    /// Percent of total memory in use
    pub memory_usage: Option<f64>,
    /// Percent of total disk space in use, across all mounted disks
    pub disk_usage: Option<f64>,
    /// 1, 5 and 15 minute load averages
    pub load_average: Vec<f64>,
    pub hostname: Option<String>,
    pub platform: String,
    pub arch: String,
}

/// Source of resource readings for telemetry samples
pub trait ResourceProbe: Send + Sync {
    fn snapshot(&self) -> ResourceSnapshot;
}

/// Probe backed by `sysinfo`.
///
/// Keeps one `System` between calls so CPU usage is measured over the
/// interval since the previous snapshot; the very first reading is 0.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl ResourceProbe for SysinfoProbe {
    fn snapshot(&self) -> ResourceSnapshot {
        let (cpu_usage, memory_usage) = {
            let mut system = self.system.lock();
            system.refresh_cpu_usage();
            system.refresh_memory();

            let cpus = system.cpus();
            let cpu_usage = if cpus.is_empty() {
                None
            } else {
                let total: f32 = cpus.iter().map(|cpu| cpu.cpu_usage()).sum();
                Some(round2((total / cpus.len() as f32) as f64))
            };

            (cpu_usage, percent(system.used_memory(), system.total_memory()))
        };

        let disks = Disks::new_with_refreshed_list();
        let total: u64 = disks.iter().map(|disk| disk.total_space()).sum();
        let available: u64 = disks.iter().map(|disk| disk.available_space()).sum();
        let disk_usage = percent(total.saturating_sub(available), total);

        let load = System::load_average();

        ResourceSnapshot {
            cpu_usage,
            memory_usage,
            disk_usage,
            load_average: vec![load.one, load.five, load.fifteen],
            hostname: System::host_name(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Probe returning a fixed snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticProbe(pub ResourceSnapshot);

impl ResourceProbe for StaticProbe {
    fn snapshot(&self) -> ResourceSnapshot {
        self.0.clone()
    }
}

fn percent(used: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(round2(used as f64 / total as f64 * 100.0))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 3), Some(33.33));
        assert_eq!(percent(5, 0), None);
    }

    #[test]
    fn test_sysinfo_probe_reports_platform() {
        let snapshot = SysinfoProbe::new().snapshot();
        assert_eq!(snapshot.platform, std::env::consts::OS);
        assert_eq!(snapshot.arch, std::env::consts::ARCH);
        assert_eq!(snapshot.load_average.len(), 3);
        if let Some(memory) = snapshot.memory_usage {
            assert!((0.0..=100.0).contains(&memory));
        }
    }
}
