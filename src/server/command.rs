//! Command submission endpoint.
//!
//! Accepts an operator command, forwards it to the scheduler worker, and
//! maps the typed outcome onto an HTTP status. Replays of an
//! already-applied request id succeed with the original audit entry and
//! `duplicate: true`.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, warn};

use super::AppState;
use crate::audit::AuditEntry;
use crate::commands::{Command, CommandError};
use crate::occupancy::OccupancyError;
use crate::state::TransitionError;
use crate::worker::SubmitError;

/// Response body for an applied (or replayed) command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub entry: AuditEntry,
    pub duplicate: bool,
}

/// Wrapper so the worker's typed errors can be an axum response.
#[derive(Debug)]
pub struct CommandRejection(SubmitError);

impl From<SubmitError> for CommandRejection {
    fn from(err: SubmitError) -> Self {
        CommandRejection(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn command_error_status(err: &CommandError) -> StatusCode {
    match err {
        CommandError::Validation(_) => StatusCode::BAD_REQUEST,
        CommandError::UnknownRecommendation(_) | CommandError::UnknownSignal(_) => {
            StatusCode::NOT_FOUND
        }
        CommandError::NotPending(_) | CommandError::StaleRecommendation(_) => StatusCode::CONFLICT,
        CommandError::RecommendationExpired(_) => StatusCode::GONE,
        CommandError::Transition(err) => transition_error_status(err),
        CommandError::Occupancy(err) => occupancy_error_status(err),
        CommandError::UnknownSection(_) => StatusCode::NOT_FOUND,
        CommandError::Audit(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn transition_error_status(err: &TransitionError) -> StatusCode {
    match err {
        TransitionError::UnknownTrain(_) => StatusCode::NOT_FOUND,
        TransitionError::UnknownSection(_) => StatusCode::NOT_FOUND,
        TransitionError::Occupancy(err) => occupancy_error_status(err),
        TransitionError::RouteExhausted(_)
        | TransitionError::DiscontinuousRoute { .. }
        | TransitionError::UnreachableHop { .. }
        | TransitionError::EmptyRoute => StatusCode::BAD_REQUEST,
    }
}

fn occupancy_error_status(err: &OccupancyError) -> StatusCode {
    match err {
        OccupancyError::CapacityExceeded { .. } | OccupancyError::NotOccupying { .. } => {
            StatusCode::CONFLICT
        }
        OccupancyError::UnknownSection(_) => StatusCode::NOT_FOUND,
    }
}

impl IntoResponse for CommandRejection {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SubmitError::WorkerGone => StatusCode::SERVICE_UNAVAILABLE,
            SubmitError::Command(err) => command_error_status(err),
        };
        if status.is_server_error() {
            warn!(error = %self.0, "command failed");
        } else {
            debug!(error = %self.0, "command rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// `POST /api/v1/commands`
///
/// The body is a [`Command`]: request id, actor, and a tagged `type` field
/// selecting accept/reject/hold/reroute/set-signal.
pub async fn command_handler(
    State(app): State<AppState>,
    Json(command): Json<Command>,
) -> Result<(StatusCode, Json<CommandResponse>), CommandRejection> {
    let applied = app.handle().submit(command).await?;
    let status = if applied.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(CommandResponse {
            entry: applied.entry,
            duplicate: applied.duplicate,
        }),
    ))
}
