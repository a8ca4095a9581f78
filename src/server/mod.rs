//! HTTP API for the scheduler.
//!
//! This module implements the HTTP server that:
//! - Accepts operator commands and forwards them to the scheduler worker
//! - Serves read-only views of the network state for dashboards
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /api/v1/commands` - Submits a command (returns the audit entry)
//! - `GET /api/v1/trains` - All trains with status and arrival estimates
//! - `GET /api/v1/sections` - Section occupancy and utilization
//! - `GET /api/v1/recommendations` - Active recommendations
//! - `GET /api/v1/audit` - Paginated, filterable audit feed
//! - `GET /api/v1/audit/export` - The audit feed as CSV
//! - `GET /api/v1/kpis` - Network performance indicators
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

use crate::worker::WorkerHandle;

pub mod command;
pub mod health;
pub mod query;

pub use command::command_handler;
pub use health::health_handler;
pub use query::{
    audit_export_handler, audit_handler, kpi_handler, recommendations_handler, sections_handler,
    trains_handler,
};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor. Reads go
/// through state snapshots; writes are forwarded to the worker, which is
/// the only task that mutates.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Channel to the single-writer scheduler worker.
    handle: WorkerHandle,

    /// Delay (minutes) at or under which a train counts as punctual.
    punctuality_threshold_minutes: u32,
}

impl AppState {
    pub fn new(handle: WorkerHandle, punctuality_threshold_minutes: u32) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                handle,
                punctuality_threshold_minutes,
            }),
        }
    }

    pub fn handle(&self) -> &WorkerHandle {
        &self.inner.handle
    }

    pub fn punctuality_threshold_minutes(&self) -> u32 {
        self.inner.punctuality_threshold_minutes
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/api/v1/commands", post(command_handler))
        .route("/api/v1/trains", get(trains_handler))
        .route("/api/v1/sections", get(sections_handler))
        .route("/api/v1/recommendations", get(recommendations_handler))
        .route("/api/v1/audit", get(audit_handler))
        .route("/api/v1/audit/export", get(audit_export_handler))
        .route("/api/v1/kpis", get(kpi_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
