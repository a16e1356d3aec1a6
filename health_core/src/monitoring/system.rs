//! Host resource sampling backed by sysinfo

use parking_lot::Mutex;
use std::path::Path;
use std::time::Duration;
use sysinfo::{Disks, Pid, System};
use tracing::debug;

use crate::error::MetricsError;
use crate::health::{DiskSample, MemorySample, MetricsSource, ProcessSample};

pub struct SysinfoMetricsSource {
    system: Mutex<System>,
    current_pid: Option<Pid>,
}

impl SysinfoMetricsSource {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();

        let current_pid = sysinfo::get_current_pid()
            .map_err(|e| debug!("Current pid unavailable: {}", e))
            .ok();

        Self {
            system: Mutex::new(system),
            current_pid,
        }
    }

    fn ensure_supported() -> Result<(), MetricsError> {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            Ok(())
        } else {
            Err(MetricsError::Unavailable("unsupported platform".to_string()))
        }
    }
}

impl Default for SysinfoMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MetricsSource for SysinfoMetricsSource {
    async fn cpu_usage(&self, window: Duration) -> Result<f64, MetricsError> {
        Self::ensure_supported()?;

        let mut system = System::new();
        system.refresh_cpu();
        tokio::time::sleep(window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)).await;
        system.refresh_cpu();

        if system.cpus().is_empty() {
            return Err(MetricsError::Unavailable("no cpu information".to_string()));
        }
        Ok(f64::from(system.global_cpu_info().cpu_usage()))
    }

    fn core_count(&self) -> Result<usize, MetricsError> {
        Self::ensure_supported()?;

        let mut system = self.system.lock();
        if system.cpus().is_empty() {
            system.refresh_cpu();
        }
        match system.cpus().len() {
            0 => Err(MetricsError::Unavailable("no cpu information".to_string())),
            cores => Ok(cores),
        }
    }

    fn load_average(&self) -> Result<Vec<f64>, MetricsError> {
        if cfg!(windows) {
            return Err(MetricsError::Unavailable("load average".to_string()));
        }
        let load = System::load_average();
        Ok(vec![load.one, load.five, load.fifteen])
    }

    fn memory(&self) -> Result<MemorySample, MetricsError> {
        Self::ensure_supported()?;

        let mut system = self.system.lock();
        system.refresh_memory();

        let total_bytes = system.total_memory();
        if total_bytes == 0 {
            return Err(MetricsError::Unavailable("memory totals".to_string()));
        }
        Ok(MemorySample {
            total_bytes,
            used_bytes: system.used_memory(),
            available_bytes: system.available_memory(),
        })
    }

    fn disk_usage(&self, path: &Path) -> Result<DiskSample, MetricsError> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .iter()
            .find(|disk| disk.mount_point() == path)
            .map(|disk| DiskSample {
                total_bytes: disk.total_space(),
                free_bytes: disk.available_space(),
            })
            .ok_or_else(|| MetricsError::NoSuchMount(path.display().to_string()))
    }

    fn process_usage(&self) -> Result<ProcessSample, MetricsError> {
        let pid = self
            .current_pid
            .ok_or_else(|| MetricsError::Unavailable("current pid".to_string()))?;

        let mut system = self.system.lock();
        if !system.refresh_process(pid) {
            return Err(MetricsError::Unavailable(format!("process {}", pid)));
        }
        let process = system
            .process(pid)
            .ok_or_else(|| MetricsError::Unavailable(format!("process {}", pid)))?;

        Ok(ProcessSample {
            resident_bytes: process.memory(),
            cpu_percent: process.cpu_usage(),
        })
    }

    fn host_uptime(&self) -> Result<Duration, MetricsError> {
        Self::ensure_supported()?;
        Ok(Duration::from_secs(System::uptime()))
    }
}
