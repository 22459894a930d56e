//! Network interface inventory and per-interval traffic rates.

use crate::error::Result;
use crate::metrics::data::{now_millis, NetworkInterfaceInfo, NetworkTraffic, TrafficSample};
use crate::metrics::traits::SampleReader;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use sysinfo::Networks;

/// Cumulative byte counters of one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteCounters {
    pub received: u64,
    pub transmitted: u64,
}

/// Samples per-interface throughput by diffing cumulative counters between reads.
pub struct NetworkTrafficReader {
    networks: Networks,
    previous: HashMap<String, ByteCounters>,
    last_read: Instant,
}

impl NetworkTrafficReader {
    pub fn new() -> Self {
        let networks = Networks::new_with_refreshed_list();
        let previous = counters(&networks);
        Self {
            networks,
            previous,
            last_read: Instant::now(),
        }
    }
}

impl Default for NetworkTrafficReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleReader for NetworkTrafficReader {
    type Sample = TrafficSample;

    fn read(&mut self) -> Result<TrafficSample> {
        self.networks.refresh();
        let now = Instant::now();
        let current = counters(&self.networks);

        let interfaces = traffic_rates(&self.previous, &current, now - self.last_read);
        self.previous = current;
        self.last_read = now;

        Ok(TrafficSample {
            timestamp: now_millis(),
            interfaces,
        })
    }
}

fn counters(networks: &Networks) -> HashMap<String, ByteCounters> {
    networks
        .iter()
        .map(|(name, data)| {
            (
                name.clone(),
                ByteCounters {
                    received: data.total_received(),
                    transmitted: data.total_transmitted(),
                },
            )
        })
        .collect()
}

/// Per-second rates between two counter readings, sorted by interface name.
///
/// Interfaces that appeared since the previous reading report zero, and a
/// counter that went backwards (interface reset) is treated as no traffic.
pub fn traffic_rates(
    previous: &HashMap<String, ByteCounters>,
    current: &HashMap<String, ByteCounters>,
    elapsed: Duration,
) -> Vec<NetworkTraffic> {
    let seconds = elapsed.as_secs_f64();
    let mut rates: Vec<NetworkTraffic> = current
        .iter()
        .map(|(interface, now)| {
            let before = previous.get(interface).copied().unwrap_or(*now);
            let per_sec = |delta: u64| if seconds > 0.0 { delta as f64 / seconds } else { 0.0 };
            NetworkTraffic {
                interface: interface.clone(),
                bytes_received_per_sec: per_sec(now.received.saturating_sub(before.received)),
                bytes_sent_per_sec: per_sec(now.transmitted.saturating_sub(before.transmitted)),
            }
        })
        .collect();
    rates.sort_by(|a, b| a.interface.cmp(&b.interface));
    rates
}

/// List network interfaces with their cumulative counters.
pub fn network_interfaces() -> Vec<NetworkInterfaceInfo> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<NetworkInterfaceInfo> = networks
        .iter()
        .map(|(name, data)| NetworkInterfaceInfo {
            name: name.clone(),
            is_up: data.total_transmitted() > 0 || data.total_received() > 0,
            total_received: data.total_received(),
            total_transmitted: data.total_transmitted(),
            packets_received: data.total_packets_received(),
            packets_transmitted: data.total_packets_transmitted(),
            errors_received: data.total_errors_on_received(),
            errors_transmitted: data.total_errors_on_transmitted(),
        })
        .collect();
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}
