//! Summary statistics over a batch of formatted snapshots.

use crate::metrics::format::{FormattedMemory, FormattedSnapshot};
use serde::{Deserialize, Serialize};

/// Batches smaller than this are too short for meaningful statistics.
pub const MIN_SNAPSHOTS_FOR_STATS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl Range {
    fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { min, max, avg })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub used: Range,
    pub free: Range,
    pub percent_used: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub cpu: Range,
    pub memory: MemoryStats,
}

impl SnapshotStats {
    /// Compute statistics over `snapshots`, or `None` when the batch is
    /// shorter than [`MIN_SNAPSHOTS_FOR_STATS`].
    ///
    /// Missing readings count as zero.
    pub fn compute(snapshots: &[FormattedSnapshot]) -> Option<Self> {
        if snapshots.len() < MIN_SNAPSHOTS_FOR_STATS {
            return None;
        }

        let cpu: Vec<f64> = snapshots
            .iter()
            .map(|s| s.cpu.as_ref().map_or(0.0, |cpu| cpu.usage_percent))
            .collect();
        let memory_field = |f: fn(&FormattedMemory) -> f64| -> Vec<f64> {
            snapshots
                .iter()
                .map(|s| s.memory.as_ref().map_or(0.0, f))
                .collect()
        };

        Some(Self {
            cpu: Range::of(&cpu)?,
            memory: MemoryStats {
                used: Range::of(&memory_field(|m| m.used_bytes as f64))?,
                free: Range::of(&memory_field(|m| m.free_bytes as f64))?,
                percent_used: Range::of(&memory_field(|m| m.percent_used))?,
            },
        })
    }
}
