//! Read-only view endpoints.
//!
//! Each handler clones a consistent snapshot of the network state from the
//! worker's shared handle and serializes a view of it. The worker is never
//! blocked by readers for longer than the snapshot clone.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::audit::{self, AuditFilter, AuditPage, EventKind};
use crate::kpi::{self, KpiSnapshot};
use crate::types::{
    DisplayStatus, Recommendation, SectionId, ServiceClass, TrainId,
};

/// One train as the dashboard sees it.
#[derive(Debug, Clone, Serialize)]
pub struct TrainView {
    pub id: TrainId,
    pub name: String,
    pub class: ServiceClass,
    pub status: DisplayStatus,
    pub current_section: Option<SectionId>,
    pub route: Vec<SectionId>,
    pub speed_kmh: u32,
    pub delay_minutes: u32,
    pub passengers: u32,
    pub scheduled_arrival: NaiveTime,
    pub estimated_arrival: NaiveTime,
}

/// One section with its live occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    pub id: SectionId,
    pub name: String,
    pub capacity: usize,
    pub occupants: Vec<TrainId>,
    /// Occupancy as a percentage of capacity.
    pub utilization: f64,
}

/// `GET /api/v1/trains`
pub async fn trains_handler(State(app): State<AppState>) -> Json<Vec<TrainView>> {
    let snapshot = app.handle().snapshot().await;
    let views = snapshot
        .trains
        .values()
        .map(|train| TrainView {
            id: train.id.clone(),
            name: train.name.clone(),
            class: train.class,
            status: train.display_status(),
            current_section: train.current_section().cloned(),
            route: train.route.clone(),
            speed_kmh: train.speed_kmh,
            delay_minutes: train.delay_minutes,
            passengers: train.passengers,
            scheduled_arrival: train.scheduled_arrival,
            estimated_arrival: train.estimated_arrival(),
        })
        .collect();
    Json(views)
}

/// `GET /api/v1/sections`
pub async fn sections_handler(State(app): State<AppState>) -> Json<Vec<SectionView>> {
    let snapshot = app.handle().snapshot().await;
    let views = snapshot
        .graph
        .sections()
        .map(|section| {
            // Every graph section has an occupancy row.
            let occupants = snapshot
                .occupancy
                .occupants(&section.id)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();
            let utilization = snapshot.occupancy.utilization(&section.id).unwrap_or(0.0);
            SectionView {
                id: section.id.clone(),
                name: section.name.clone(),
                capacity: section.capacity,
                occupants,
                utilization,
            }
        })
        .collect();
    Json(views)
}

/// `GET /api/v1/recommendations` — pending, unexpired, best first.
pub async fn recommendations_handler(
    State(app): State<AppState>,
) -> Json<Vec<Recommendation>> {
    let snapshot = app.handle().snapshot().await;
    let active = snapshot
        .active_recommendations()
        .into_iter()
        .cloned()
        .collect();
    Json(active)
}

/// Query parameters for the audit feed.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub event: Option<EventKind>,
    pub train: Option<TrainId>,
    pub user: Option<String>,
}

const DEFAULT_AUDIT_PER_PAGE: usize = 20;

/// `GET /api/v1/audit?page=&per_page=&event=&train=&user=`
pub async fn audit_handler(
    State(app): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditPage>, StatusCode> {
    let entries = app
        .handle()
        .audit_entries()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    let filter = AuditFilter {
        event: query.event,
        train: query.train,
        user: query.user,
    };
    let page = audit::paginate(
        &entries,
        &filter,
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(DEFAULT_AUDIT_PER_PAGE),
    );
    Ok(Json(page))
}

/// `GET /api/v1/audit/export` — the full feed as CSV.
pub async fn audit_export_handler(State(app): State<AppState>) -> Result<Response, StatusCode> {
    let entries = app
        .handle()
        .audit_entries()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    let csv = audit::to_csv(&entries);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"audit-log.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

/// `GET /api/v1/kpis`
pub async fn kpi_handler(State(app): State<AppState>) -> Json<KpiSnapshot> {
    let snapshot = app.handle().snapshot().await;
    Json(kpi::compute(&snapshot, app.punctuality_threshold_minutes()))
}
