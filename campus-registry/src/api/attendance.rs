//! Attendance routes

use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use campus_common::time::normalize_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{require_role, AckResponse, ApiError};
use crate::attendance::{AttendanceRecord, BulkMarkRequest, BulkMarkSummary, MarkRequest};
use crate::error::RegistryError;
use crate::identity::{Actor, Role};
use crate::AppState;

const MARKERS: &[Role] = &[Role::Admin, Role::Staff];
const READERS: &[Role] = &[Role::Admin, Role::Staff, Role::Hod];

#[derive(Debug, Deserialize)]
pub struct ClassDayQuery {
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct ClassDayResponse {
    pub class_id: String,
    pub date: NaiveDate,
    pub records: Vec<AttendanceRecord>,
}

/// POST /api/attendance/mark
pub async fn mark(
    State(state): State<AppState>,
    actor: Actor,
    payload: Result<Json<MarkRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    require_role(&actor, MARKERS, "mark attendance")?;
    let Json(request) = payload?;

    let ack = state.ledger.mark_attendance(&actor, request).await?;
    Ok(Json(AckResponse::new(ack, "Attendance marked")))
}

/// POST /api/attendance/mark-bulk
pub async fn mark_bulk(
    State(state): State<AppState>,
    actor: Actor,
    payload: Result<Json<BulkMarkRequest>, JsonRejection>,
) -> Result<Json<BulkMarkSummary>, ApiError> {
    require_role(&actor, MARKERS, "mark attendance")?;
    let Json(request) = payload?;

    Ok(Json(state.ledger.mark_bulk(&actor, request).await?))
}

/// GET /api/attendance/class/:class_id?date=YYYY-MM-DD
pub async fn class_day(
    State(state): State<AppState>,
    actor: Actor,
    Path(class_id): Path<String>,
    query: Result<Query<ClassDayQuery>, QueryRejection>,
) -> Result<Json<ClassDayResponse>, ApiError> {
    require_role(&actor, READERS, "view class attendance")?;
    let Query(query) = query?;

    let date = normalize_date(&query.date).map_err(RegistryError::from)?;
    let records = state.ledger.records_for_class(&class_id, date).await?;

    Ok(Json(ClassDayResponse {
        class_id,
        date,
        records,
    }))
}

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/attendance/mark", post(mark))
        .route("/api/attendance/mark-bulk", post(mark_bulk))
        .route("/api/attendance/class/:class_id", get(class_day))
}
