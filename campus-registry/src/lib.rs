//! campus-registry: attendance and timetable records for a school
//!
//! Two record kinds are owned here, both keyed by a natural composite key
//! and written with update-or-create semantics:
//! - attendance, keyed by (student, date, optional timetable slot)
//! - timetable slots, keyed by (class, day, period)
//!
//! Students, classes and faculty live in read-only directories. Identity is
//! supplied by an upstream gateway.

use std::sync::Arc;
use std::time::Duration;

use axum::{error_handling::HandleErrorLayer, response::IntoResponse, BoxError, Router};
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod attendance;
pub mod directory;
pub mod error;
pub mod identity;
pub mod notify;
pub mod timetable;
pub mod upsert;

pub use attendance::{AttendanceLedger, AttendanceRecord, AttendanceStatus, MarkRequest};
pub use error::{RegistryError, Result};
pub use identity::{Actor, Role};
pub use notify::{AttendanceAlert, Notifier};
pub use timetable::{SlotAssignment, TimetableRegistry};
pub use upsert::{Ack, Outcome};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: AttendanceLedger,
    pub timetable: TimetableRegistry,
}

impl AppState {
    pub fn new(pool: SqlitePool, periods_per_day: u32, notifier: Arc<dyn Notifier>) -> Self {
        let timetable = TimetableRegistry::new(pool.clone(), periods_per_day);
        let ledger = AttendanceLedger::new(pool, timetable.clone(), notifier);
        Self { ledger, timetable }
    }
}

/// Build the application router
///
/// Every request runs under `request_timeout`; expiry is reported as a
/// generic server error.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let timeout_ms = u64::try_from(request_timeout.as_millis()).unwrap_or(u64::MAX);

    Router::new()
        .merge(api::health_routes())
        .merge(api::attendance_routes())
        .merge(api::timetable_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                    middleware_error(err, timeout_ms).into_response()
                }))
                .timeout(request_timeout),
        )
        .layer(CorsLayer::permissive())
}

fn middleware_error(err: BoxError, timeout_ms: u64) -> RegistryError {
    if err.is::<tower::timeout::error::Elapsed>() {
        RegistryError::Timeout(timeout_ms)
    } else {
        RegistryError::Internal(err.to_string())
    }
}
