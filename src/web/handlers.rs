//! HTTP handlers for API endpoints.

use crate::metrics::collector::{measure_cpu_usage, normalize_disk_path, read_battery};
use crate::metrics::data::ProcessSort;
use crate::metrics::format::FormattedDisk;
use crate::metrics::network::network_interfaces;
use crate::metrics::{
    NetworkTrafficReader, PeriodicProvider, SnapshotFormatter, SnapshotStats, SystemCollector,
    TrafficFormatter,
};
use crate::session::{collect, SessionKind};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

type Params = HashMap<String, String>;

/// Window over which the CPU endpoint measures usage.
const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Number of processes listed by the processes endpoint.
const TOP_PROCESS_COUNT: usize = 5;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = BYTES_PER_MB * 1024.0;

/// Error responses returned by the API.
#[derive(Debug)]
pub enum ApiError {
    /// Query parameters the endpoint does not accept, sorted by name
    UnexpectedParameters(Vec<String>),
    NotFound(String),
    /// Data for `resource` could not be produced
    Failed { resource: &'static str, message: String },
}

impl ApiError {
    fn failed(resource: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Failed {
            resource,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::UnexpectedParameters(names) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "errors": [format!("Unexpected query parameters: {}", names.join(", "))]
                })),
            )
                .into_response(),
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Failed { resource, message } => {
                error!("Failed to fetch {} data: {}", resource, message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": format!("Failed to fetch {} data: {}", resource, message)
                    })),
                )
                    .into_response()
            }
        }
    }
}

/// Reject any query parameter not listed in `allowed`.
pub fn reject_unexpected(params: &Params, allowed: &[&str]) -> Result<(), ApiError> {
    let mut unexpected: Vec<String> = params
        .keys()
        .filter(|name| !allowed.contains(&name.as_str()))
        .cloned()
        .collect();
    if unexpected.is_empty() {
        return Ok(());
    }
    unexpected.sort();
    debug!(?unexpected, "Rejecting request with unexpected query parameters");
    Err(ApiError::UnexpectedParameters(unexpected))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// API index listing the available endpoints.
pub async fn index() -> Json<Value> {
    Json(json!({
        "name": "hostpulse",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /api/system": "Batch of system snapshots with summary statistics",
            "GET /api/system/history": "Rolling window of the most recent snapshots",
            "GET /api/network": "Network interfaces and sampled traffic rates",
            "GET /api/cpu": "CPU usage, model and clock speeds",
            "GET /api/memory": "Memory usage",
            "GET /api/disks": "Disk usage, optionally for the disk holding ?path=",
            "GET /api/hardware": "CPU temperature and battery",
            "GET /api/processes": "Top processes by CPU and by memory",
            "GET /api/sessions": "State of each sampling session",
            "DELETE /api/sessions/:kind": "Stop a running sampling session",
            "GET /api/health": "Health check",
        }
    }))
}

/// Run (or join) the system sampling session.
pub async fn system(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    reject_unexpected(&params, &[])?;
    let sampler = state.sampling.system;
    let formatter = SnapshotFormatter {
        max_processes: state.sampling.max_processes,
    };

    let snapshots = collect(
        &state.snapshots,
        SessionKind::SYSTEM,
        sampler.session,
        move || Ok(PeriodicProvider::new(SystemCollector::new()?, sampler.interval)),
        formatter,
    )
    .await
    .map_err(|err| ApiError::failed("system", err))?;

    Ok(Json(json!({
        "snapshots": &*snapshots,
        "stats": SnapshotStats::compute(&snapshots),
    })))
}

/// Run (or join) the rolling history session. Returns the latest snapshots
/// once the session times out or is stopped.
pub async fn system_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    reject_unexpected(&params, &[])?;
    let sampler = state.sampling.history;
    let formatter = SnapshotFormatter {
        max_processes: state.sampling.max_processes,
    };

    let snapshots = collect(
        &state.snapshots,
        SessionKind::HISTORY,
        sampler.session,
        move || Ok(PeriodicProvider::new(SystemCollector::new()?, sampler.interval)),
        formatter,
    )
    .await
    .map_err(|err| ApiError::failed("system history", err))?;

    Ok(Json(json!({ "snapshots": &*snapshots })))
}

/// Interface list plus a network traffic sampling session.
pub async fn network(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    reject_unexpected(&params, &[])?;
    let sampler = state.sampling.network;
    let interfaces = tokio::task::spawn_blocking(network_interfaces)
        .await
        .map_err(|err| ApiError::failed("network", err))?;

    let traffic = collect(
        &state.traffic,
        SessionKind::NETWORK,
        sampler.session,
        move || Ok(PeriodicProvider::new(NetworkTrafficReader::new(), sampler.interval)),
        TrafficFormatter,
    )
    .await
    .map_err(|err| ApiError::failed("network", err))?;

    Ok(Json(json!({
        "interfaces": interfaces,
        "traffic": &*traffic,
    })))
}

pub async fn cpu(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    reject_unexpected(&params, &[])?;
    // Measured on its own System; the shared collector is only locked for details
    let usage = measure_cpu_usage(CPU_SAMPLE_WINDOW)
        .await
        .map_err(|err| ApiError::failed("cpu", err))?;
    let details = state
        .with_collector(|collector| collector.cpu_details())
        .await
        .map_err(|err| ApiError::failed("cpu", err))?;

    Ok(Json(json!({
        "usage": usage.overall,
        "core0_usage": usage.cores.first(),
        "total_cores": details.total_cores,
        "model": details.model,
        "avg_clock_mhz": details.avg_clock_mhz,
        "clock_mhz": details.clock_mhz,
    })))
}

pub async fn memory(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    reject_unexpected(&params, &[])?;
    let memory = state
        .with_collector(|collector| collector.memory())
        .await
        .map_err(|err| ApiError::failed("memory", err))?;

    Ok(Json(json!({
        "usage": memory,
        "total_mb": round2(memory.total as f64 / BYTES_PER_MB),
        "total_gb": round2(memory.total as f64 / BYTES_PER_GB),
        "free_mb": round2(memory.free as f64 / BYTES_PER_MB),
        "free_gb": round2(memory.free as f64 / BYTES_PER_GB),
    })))
}

pub async fn disks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    reject_unexpected(&params, &["path"])?;
    let path = params.get("path").map(|path| normalize_disk_path(path));
    let (all, matching) = state
        .with_collector(move |collector| {
            let all = collector.disks();
            let matching = path.map(|path| {
                let disks = collector.disk_for_path(&path);
                (path, disks)
            });
            (all, matching)
        })
        .await
        .map_err(|err| ApiError::failed("disks", err))?;

    let all: Vec<FormattedDisk> = all.iter().map(FormattedDisk::from).collect();
    let for_path = matching.map(|(path, disks)| {
        let disks: Vec<FormattedDisk> = disks.iter().map(FormattedDisk::from).collect();
        json!({ "path": path, "disks": disks })
    });

    Ok(Json(json!({
        "disks": all,
        "for_path": for_path,
    })))
}

pub async fn hardware(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    reject_unexpected(&params, &[])?;
    let temperature = state
        .with_collector(|collector| collector.cpu_temperature())
        .await
        .map_err(|err| ApiError::failed("hardware", err))?;
    let battery = tokio::task::spawn_blocking(read_battery)
        .await
        .map_err(|err| ApiError::failed("hardware", err))?;

    Ok(Json(json!({
        "cpu_temperature": temperature,
        "battery": battery,
    })))
}

pub async fn processes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    reject_unexpected(&params, &[])?;
    let (by_cpu, by_memory) = state
        .with_collector(|collector| {
            let by_cpu = collector.top_processes(TOP_PROCESS_COUNT, ProcessSort::Cpu);
            let by_memory = collector.ranked_processes(TOP_PROCESS_COUNT, ProcessSort::Memory);
            (by_cpu, by_memory)
        })
        .await
        .map_err(|err| ApiError::failed("processes", err))?;

    Ok(Json(json!({
        "by_cpu": by_cpu,
        "by_memory": by_memory,
    })))
}

/// State of each sampling session kind.
pub async fn sessions(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "system": state.session_state(&SessionKind::SYSTEM),
        "history": state.session_state(&SessionKind::HISTORY),
        "network": state.session_state(&SessionKind::NETWORK),
    }))
}

/// Stop a running session. Its waiters receive whatever was collected so far.
pub async fn cancel_session(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let kind = SessionKind::new(kind);
    if state.cancel_session(&kind) {
        Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "cancelled": kind.as_str() })),
        ))
    } else {
        Err(ApiError::NotFound(format!(
            "No running session of kind '{}'",
            kind
        )))
    }
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "hostpulse",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.active_sessions(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
