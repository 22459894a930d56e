//! Data structures for raw metric samples and point reads.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One timestamped system reading. Every sub-reading is optional because
/// individual readers may be unavailable on a given host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Timestamp when this snapshot was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    pub cpu: Option<CpuSnapshot>,
    pub memory: Option<MemorySnapshot>,
    pub disks: Option<Vec<DiskInfo>>,
    pub battery: Option<BatteryInfo>,
    pub processes: Option<Vec<ProcessInfo>>,
}

impl SystemSnapshot {
    /// Create an empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self::at(now_millis())
    }

    /// Create an empty snapshot with an explicit timestamp.
    pub fn at(timestamp: u64) -> Self {
        Self {
            timestamp,
            cpu: None,
            memory: None,
            disks: None,
            battery: None,
            processes: None,
        }
    }
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// CPU usage at the time of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    /// Average usage across all cores (0.0 to 100.0)
    pub usage: f32,
    pub load_average: Option<LoadAverage>,
    pub temperature: Option<CpuTemperature>,
}

/// System load averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub one_minute: f64,
    pub five_minutes: f64,
    pub fifteen_minutes: f64,
}

/// CPU temperature in Celsius, overall and per sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuTemperature {
    pub main: f32,
    pub cores: Vec<f32>,
}

/// Physical memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub used: u64,
    pub total: u64,
    pub free: u64,
    pub percent_used: f32,
}

/// Storage device information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskInfo {
    /// Device or filesystem name (e.g. "/dev/sda1")
    pub filesystem: String,
    pub mount_point: String,
    /// Total space in bytes
    pub size: u64,
    /// Used space in bytes
    pub used: u64,
    /// Available space in bytes
    pub available: u64,
    pub percent_used: f32,
}

/// Battery state. `has_battery` is false on hosts without one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryInfo {
    pub has_battery: bool,
    pub percent: f32,
    pub is_charging: bool,
    /// Minutes remaining, when the platform reports it
    pub time_remaining: Option<u64>,
}

/// A single process as seen in the process table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// CPU usage percentage
    pub cpu: f32,
    /// Resident memory in bytes
    pub memory: u64,
    pub memory_percent: f32,
}

/// Sort key for top-N process queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessSort {
    Cpu,
    Memory,
}

/// Throughput of one network interface over the last sampling interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkTraffic {
    pub interface: String,
    pub bytes_received_per_sec: f64,
    pub bytes_sent_per_sec: f64,
}

/// One network traffic reading: every interface at a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSample {
    pub timestamp: u64,
    pub interfaces: Vec<NetworkTraffic>,
}

/// Network interface inventory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceInfo {
    /// Interface name (e.g., "wlan0", "eth0")
    pub name: String,
    pub is_up: bool,
    pub total_received: u64,
    pub total_transmitted: u64,
    pub packets_received: u64,
    pub packets_transmitted: u64,
    pub errors_received: u64,
    pub errors_transmitted: u64,
}

/// CPU usage averaged over a sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsagePercent {
    pub percent: f32,
    pub seconds: f64,
}

/// Overall and per-core usage taken from the same pair of CPU refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub overall: UsagePercent,
    pub cores: Vec<UsagePercent>,
}

/// Static CPU description plus current clock speeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuDetails {
    pub model: String,
    pub total_cores: usize,
    pub avg_clock_mhz: u64,
    pub clock_mhz: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_has_no_readings() {
        let snapshot = SystemSnapshot::at(42);
        assert_eq!(snapshot.timestamp, 42);
        assert!(snapshot.cpu.is_none());
        assert!(snapshot.memory.is_none());
        assert!(snapshot.disks.is_none());
        assert!(snapshot.battery.is_none());
        assert!(snapshot.processes.is_none());
    }

    #[test]
    fn test_process_sort_parses_lowercase() {
        let sort: ProcessSort = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(sort, ProcessSort::Memory);
    }
}
