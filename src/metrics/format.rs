//! Caller-facing projections of raw samples.

use crate::metrics::data::*;
use crate::metrics::traits::Formatter;
use serde::{Deserialize, Serialize};

const BYTE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Render a byte count with 1024-based units, two decimals, trailing zeros dropped.
///
/// `0` renders as `"0 Bytes"`, `1536` as `"1.5 KB"`.
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes as f64)
}

/// Render a bytes-per-second rate, e.g. `"1.5 KB/s"`.
pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_size(bytes_per_sec))
}

fn format_size(bytes: f64) -> String {
    if !(bytes > 0.0) {
        return "0 Bytes".to_string();
    }
    let exponent = (bytes.ln() / 1024f64.ln()).floor();
    let index = exponent.clamp(0.0, (BYTE_UNITS.len() - 1) as f64) as usize;
    let value = bytes / 1024f64.powi(index as i32);

    let rendered = format!("{:.2}", value);
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rendered, BYTE_UNITS[index])
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// One system snapshot as returned to HTTP callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedSnapshot {
    pub timestamp: u64,
    /// RFC 3339 rendering of `timestamp`
    pub time: String,
    pub cpu: Option<FormattedCpu>,
    pub memory: Option<FormattedMemory>,
    pub disks: Vec<FormattedDisk>,
    /// Present only when the host has a battery
    pub battery: Option<BatteryInfo>,
    pub processes: Vec<FormattedProcess>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedCpu {
    pub usage_percent: f64,
    pub load_average: Option<LoadAverage>,
    pub temperature: Option<CpuTemperature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedMemory {
    pub used: String,
    pub total: String,
    pub free: String,
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub percent_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedDisk {
    pub filesystem: String,
    pub mount_point: String,
    pub size: String,
    pub used: String,
    pub available: String,
    pub size_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub percent_used: f64,
}

impl From<&DiskInfo> for FormattedDisk {
    fn from(disk: &DiskInfo) -> Self {
        Self {
            filesystem: disk.filesystem.clone(),
            mount_point: disk.mount_point.clone(),
            size: format_bytes(disk.size),
            used: format_bytes(disk.used),
            available: format_bytes(disk.available),
            size_bytes: disk.size,
            used_bytes: disk.used,
            available_bytes: disk.available,
            percent_used: round1(disk.percent_used as f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedProcess {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory: String,
    pub memory_bytes: u64,
    pub memory_percent: f64,
}

/// Formats [`SystemSnapshot`]s, keeping at most `max_processes` processes.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotFormatter {
    pub max_processes: usize,
}

impl Default for SnapshotFormatter {
    fn default() -> Self {
        Self { max_processes: 3 }
    }
}

impl Formatter for SnapshotFormatter {
    type Input = SystemSnapshot;
    type Output = FormattedSnapshot;

    fn format(&self, snapshot: &SystemSnapshot) -> FormattedSnapshot {
        let time = chrono::DateTime::from_timestamp_millis(snapshot.timestamp as i64)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();

        FormattedSnapshot {
            timestamp: snapshot.timestamp,
            time,
            cpu: snapshot.cpu.as_ref().map(|cpu| FormattedCpu {
                usage_percent: round1(cpu.usage as f64),
                load_average: cpu.load_average,
                temperature: cpu.temperature.clone(),
            }),
            memory: snapshot.memory.map(|memory| FormattedMemory {
                used: format_bytes(memory.used),
                total: format_bytes(memory.total),
                free: format_bytes(memory.free),
                used_bytes: memory.used,
                total_bytes: memory.total,
                free_bytes: memory.free,
                percent_used: round1(memory.percent_used as f64),
            }),
            disks: snapshot
                .disks
                .iter()
                .flatten()
                .map(FormattedDisk::from)
                .collect(),
            battery: snapshot
                .battery
                .as_ref()
                .filter(|battery| battery.has_battery)
                .cloned(),
            processes: snapshot
                .processes
                .iter()
                .flatten()
                .take(self.max_processes)
                .map(|process| FormattedProcess {
                    pid: process.pid,
                    name: process.name.clone(),
                    cpu_percent: round1(process.cpu as f64),
                    memory: format_bytes(process.memory),
                    memory_bytes: process.memory,
                    memory_percent: round1(process.memory_percent as f64),
                })
                .collect(),
        }
    }
}

/// Traffic of one interface as returned to HTTP callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedInterfaceTraffic {
    pub interface: String,
    pub bytes_received_per_sec: f64,
    pub bytes_sent_per_sec: f64,
    pub download: String,
    pub upload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedTraffic {
    pub timestamp: u64,
    pub interfaces: Vec<FormattedInterfaceTraffic>,
}

/// Formats [`TrafficSample`]s with human-readable rates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficFormatter;

impl Formatter for TrafficFormatter {
    type Input = TrafficSample;
    type Output = FormattedTraffic;

    fn format(&self, sample: &TrafficSample) -> FormattedTraffic {
        FormattedTraffic {
            timestamp: sample.timestamp,
            interfaces: sample
                .interfaces
                .iter()
                .map(|iface| FormattedInterfaceTraffic {
                    interface: iface.interface.clone(),
                    bytes_received_per_sec: iface.bytes_received_per_sec,
                    bytes_sent_per_sec: iface.bytes_sent_per_sec,
                    download: format_rate(iface.bytes_received_per_sec),
                    upload: format_rate(iface.bytes_sent_per_sec),
                })
                .collect(),
        }
    }
}
