//! Host metric readers backed by sysinfo and direct /sys access.

use crate::error::{Result, SystemError};
use crate::metrics::data::*;
use crate::metrics::traits::SampleReader;
use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{
    Components, CpuRefreshKind, Disks, RefreshKind, System, MINIMUM_CPU_UPDATE_INTERVAL,
};

/// Number of processes embedded in each system snapshot.
pub const SNAPSHOT_PROCESS_COUNT: usize = 5;

/// System metrics collector using sysinfo.
///
/// CPU usage (overall and per process) is the delta between two refreshes,
/// so every full refresh is spaced at least [`MINIMUM_CPU_UPDATE_INTERVAL`]
/// after the previous one. The wait blocks the calling thread; async callers
/// go through `spawn_blocking`.
pub struct SystemCollector {
    system: System,
    disks: Disks,
    components: Components,
    last_refresh: Instant,
    refresh_gap: Option<Duration>,
}

impl SystemCollector {
    /// Create a new system collector instance.
    pub fn new() -> Result<Self> {
        let system = System::new_all();
        let last_refresh = Instant::now();
        let disks = Disks::new_with_refreshed_list();
        let components = Components::new_with_refreshed_list();

        if system.cpus().is_empty() {
            return Err(SystemError::system_error("No CPU information available"));
        }

        Ok(Self {
            system,
            disks,
            components,
            last_refresh,
            refresh_gap: None,
        })
    }

    /// Refresh system information.
    fn refresh(&mut self) {
        self.refresh_system();
        self.disks.refresh();
        self.components.refresh();
    }

    fn refresh_system(&mut self) {
        let since = self.last_refresh.elapsed();
        if since < MINIMUM_CPU_UPDATE_INTERVAL {
            thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL - since);
        }
        let now = Instant::now();
        self.refresh_gap = Some(now - self.last_refresh);
        self.last_refresh = now;
        self.system.refresh_all();
    }

    /// Time between the two most recent full refreshes, which is the window
    /// the current CPU figures cover. `None` until the first refresh after
    /// construction.
    pub fn refresh_gap(&self) -> Option<Duration> {
        self.refresh_gap
    }

    fn average_cpu_usage(&self) -> f32 {
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return 0.0;
        }
        cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32
    }

    /// Collect one full snapshot from already-refreshed state.
    fn snapshot(&self) -> SystemSnapshot {
        let mut snapshot = SystemSnapshot::new();
        snapshot.cpu = Some(CpuSnapshot {
            usage: self.average_cpu_usage(),
            load_average: Some(read_load_average()),
            temperature: self.read_temperature(),
        });
        snapshot.memory = Some(self.read_memory());
        snapshot.disks = Some(self.read_disks());
        snapshot.battery = Some(read_battery());
        snapshot.processes =
            Some(self.ranked_processes(SNAPSHOT_PROCESS_COUNT, ProcessSort::Cpu));
        snapshot
    }

    /// CPU model, core count and current clock speeds.
    pub fn cpu_details(&self) -> CpuDetails {
        let cpus = self.system.cpus();
        let clock_mhz: Vec<u64> = cpus.iter().map(|cpu| cpu.frequency()).collect();
        let avg_clock_mhz = if clock_mhz.is_empty() {
            0
        } else {
            clock_mhz.iter().sum::<u64>() / clock_mhz.len() as u64
        };

        CpuDetails {
            model: cpus
                .first()
                .map(|cpu| cpu.brand().trim().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            total_cores: cpus.len(),
            avg_clock_mhz,
            clock_mhz,
        }
    }

    /// Current memory figures.
    pub fn memory(&mut self) -> MemorySnapshot {
        self.system.refresh_memory();
        self.read_memory()
    }

    fn read_memory(&self) -> MemorySnapshot {
        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let percent_used = if total > 0 {
            (used as f32 / total as f32) * 100.0
        } else {
            0.0
        };

        MemorySnapshot {
            used,
            total,
            free: self.system.available_memory(),
            percent_used,
        }
    }

    /// All mounted disks.
    pub fn disks(&mut self) -> Vec<DiskInfo> {
        self.disks.refresh();
        self.read_disks()
    }

    /// The disk holding `path`: the mounted disk with the longest mount point
    /// that prefixes the (normalized) path.
    pub fn disk_for_path(&mut self, path: &str) -> Vec<DiskInfo> {
        let normalized = normalize_disk_path(path);
        let target = Path::new(&normalized);
        self.disks()
            .into_iter()
            .filter(|disk| target.starts_with(&disk.mount_point))
            .max_by_key(|disk| disk.mount_point.len())
            .into_iter()
            .collect()
    }

    fn read_disks(&self) -> Vec<DiskInfo> {
        self.disks
            .iter()
            .map(|disk| {
                let size = disk.total_space();
                let available = disk.available_space();
                let used = size.saturating_sub(available);
                let percent_used = if size > 0 {
                    (used as f32 / size as f32) * 100.0
                } else {
                    0.0
                };

                DiskInfo {
                    filesystem: disk.name().to_string_lossy().to_string(),
                    mount_point: disk.mount_point().to_string_lossy().to_string(),
                    size,
                    used,
                    available,
                    percent_used,
                }
            })
            .collect()
    }

    /// CPU temperature, when the host exposes thermal sensors.
    pub fn cpu_temperature(&mut self) -> Option<CpuTemperature> {
        self.components.refresh();
        self.read_temperature()
    }

    fn read_temperature(&self) -> Option<CpuTemperature> {
        let readings: Vec<(String, f32)> = self
            .components
            .iter()
            .map(|component| (component.label().to_lowercase(), component.temperature()))
            .filter(|(_, celsius)| celsius.is_finite() && *celsius > 0.0)
            .collect();
        if readings.is_empty() {
            return None;
        }

        let cores: Vec<f32> = readings
            .iter()
            .filter(|(label, _)| label.contains("core"))
            .map(|(_, celsius)| *celsius)
            .collect();
        let main = readings
            .iter()
            .find(|(label, _)| {
                label.contains("package") || label.contains("tctl") || label.contains("cpu")
            })
            .map(|(_, celsius)| *celsius)
            .or_else(|| {
                (!cores.is_empty()).then(|| cores.iter().sum::<f32>() / cores.len() as f32)
            })
            .unwrap_or_else(|| readings.iter().map(|(_, c)| *c).fold(f32::MIN, f32::max));

        Some(CpuTemperature { main, cores })
    }

    /// Top `limit` processes ordered by CPU or memory, highest first.
    pub fn top_processes(&mut self, limit: usize, sort: ProcessSort) -> Vec<ProcessInfo> {
        self.refresh_system();
        self.ranked_processes(limit, sort)
    }

    /// Like [`top_processes`](Self::top_processes), but ranks the process
    /// table from the last refresh.
    pub fn ranked_processes(&self, limit: usize, sort: ProcessSort) -> Vec<ProcessInfo> {
        let total_memory = self.system.total_memory();
        let mut processes: Vec<ProcessInfo> = self
            .system
            .processes()
            .values()
            .map(|process| {
                let memory = process.memory();
                ProcessInfo {
                    pid: process.pid().as_u32(),
                    name: OsStr::new(process.name()).to_string_lossy().into_owned(),
                    cpu: process.cpu_usage(),
                    memory,
                    memory_percent: if total_memory > 0 {
                        (memory as f32 / total_memory as f32) * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        match sort {
            ProcessSort::Cpu => {
                processes.sort_by(|a, b| b.cpu.partial_cmp(&a.cpu).unwrap_or(Ordering::Equal))
            }
            ProcessSort::Memory => processes.sort_by(|a, b| b.memory.cmp(&a.memory)),
        }
        processes.truncate(limit);
        processes
    }
}

impl SampleReader for SystemCollector {
    type Sample = SystemSnapshot;

    fn read(&mut self) -> Result<SystemSnapshot> {
        self.refresh();
        if self.system.cpus().is_empty() {
            return Err(SystemError::system_error("No CPU information available"));
        }
        Ok(self.snapshot())
    }
}

/// Overall and per-core CPU usage over `window`, measured on a dedicated
/// CPU-only `System` so no shared collector is held while waiting.
///
/// The window is clamped to [`MINIMUM_CPU_UPDATE_INTERVAL`], below which
/// usage figures are meaningless.
pub async fn measure_cpu_usage(window: Duration) -> Result<CpuUsage> {
    let window = window.max(MINIMUM_CPU_UPDATE_INTERVAL);
    let started = Instant::now();
    let system = tokio::task::spawn_blocking(|| {
        System::new_with_specifics(
            RefreshKind::new().with_cpu(CpuRefreshKind::new().with_cpu_usage()),
        )
    })
    .await
    .map_err(|err| SystemError::system_error(format!("CPU refresh failed: {}", err)))?;

    tokio::time::sleep(window).await;

    let system = tokio::task::spawn_blocking(move || {
        let mut system = system;
        system.refresh_cpu_usage();
        system
    })
    .await
    .map_err(|err| SystemError::system_error(format!("CPU refresh failed: {}", err)))?;

    let seconds = started.elapsed().as_secs_f64();
    let cores: Vec<UsagePercent> = system
        .cpus()
        .iter()
        .map(|cpu| UsagePercent {
            percent: cpu.cpu_usage(),
            seconds,
        })
        .collect();
    if cores.is_empty() {
        return Err(SystemError::system_error("No CPU information available"));
    }
    let percent = cores.iter().map(|core| core.percent).sum::<f32>() / cores.len() as f32;

    Ok(CpuUsage {
        overall: UsagePercent { percent, seconds },
        cores,
    })
}

/// Read system load averages.
pub fn read_load_average() -> LoadAverage {
    let load = System::load_average();
    LoadAverage {
        one_minute: load.one,
        five_minutes: load.five,
        fifteen_minutes: load.fifteen,
    }
}

/// Read battery state from /sys/class/power_supply.
pub fn read_battery() -> BatteryInfo {
    read_battery_from(Path::new("/sys/class/power_supply")).unwrap_or_default()
}

fn read_battery_from(root: &Path) -> Option<BatteryInfo> {
    let read = |dir: &Path, name: &str| {
        fs::read_to_string(dir.join(name))
            .ok()
            .map(|s| s.trim().to_string())
    };

    let battery_dir = fs::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .find(|dir| read(dir, "type").as_deref() == Some("Battery"))?;

    let percent = read(&battery_dir, "capacity")?.parse::<f32>().ok()?;
    let status = read(&battery_dir, "status").unwrap_or_default();
    let is_charging = status == "Charging";

    // energy_* is reported in µWh, power_now in µW
    let time_remaining = if is_charging {
        None
    } else {
        let energy = read(&battery_dir, "energy_now").and_then(|s| s.parse::<u64>().ok());
        let power = read(&battery_dir, "power_now").and_then(|s| s.parse::<u64>().ok());
        match (energy, power) {
            (Some(energy), Some(power)) if power > 0 => Some(energy * 60 / power),
            _ => None,
        }
    };

    Some(BatteryInfo {
        has_battery: true,
        percent,
        is_charging,
        time_remaining,
    })
}

/// Add the missing colon to bare drive-letter paths (`C` → `C:`,
/// `D\data` → `D:\data`); other paths pass through unchanged.
pub fn normalize_disk_path(path: &str) -> String {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => format!("{}:", letter),
        (Some(letter), Some(sep))
            if letter.is_ascii_alphabetic() && (sep == '\\' || sep == '/') =>
        {
            format!("{}:{}", letter, &path[1..])
        }
        _ => path.to_string(),
    }
}
