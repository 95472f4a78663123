//! Timetable routes

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{require_role, AckResponse, ApiError};
use crate::identity::{Actor, Role};
use crate::timetable::{FacultySlotSummary, SlotAssignment, TimetableSlot};
use crate::upsert::Outcome;
use crate::AppState;

const PLANNERS: &[Role] = &[Role::Admin, Role::Hod];

/// POST /api/timetable
///
/// 201 when the slot was created, 200 when an existing slot was reassigned.
pub async fn assign(
    State(state): State<AppState>,
    actor: Actor,
    payload: Result<Json<SlotAssignment>, JsonRejection>,
) -> Result<(StatusCode, Json<AckResponse>), ApiError> {
    require_role(&actor, PLANNERS, "assign timetable slots")?;
    let Json(assignment) = payload?;

    let ack = state.timetable.assign_slot(&actor, assignment).await?;
    let response = match ack.outcome {
        Outcome::Created => (
            StatusCode::CREATED,
            Json(AckResponse::new(ack, "Timetable entry created")),
        ),
        Outcome::Updated => (StatusCode::OK, Json(AckResponse::new(ack, "Timetable updated"))),
    };
    Ok(response)
}

/// GET /api/timetable/faculty/:faculty_id
pub async fn for_faculty(
    State(state): State<AppState>,
    _actor: Actor,
    Path(faculty_id): Path<String>,
) -> Result<Json<Vec<FacultySlotSummary>>, ApiError> {
    Ok(Json(state.timetable.slots_for_faculty(&faculty_id).await?))
}

/// GET /api/timetable/class/:class_id
pub async fn for_class(
    State(state): State<AppState>,
    _actor: Actor,
    Path(class_id): Path<String>,
) -> Result<Json<Vec<TimetableSlot>>, ApiError> {
    Ok(Json(state.timetable.slots_for_class(&class_id).await?))
}

pub fn timetable_routes() -> Router<AppState> {
    Router::new()
        .route("/api/timetable", post(assign))
        .route("/api/timetable/faculty/:faculty_id", get(for_faculty))
        .route("/api/timetable/class/:class_id", get(for_class))
}
