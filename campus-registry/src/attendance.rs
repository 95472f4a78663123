//! AttendanceLedger: one record per (student, date, timetable slot)
//!
//! When no slot is given the key is (student, date) alone. The class is
//! required on the stored record but not part of the key; a new record takes
//! its class from the request or, failing that, from the referenced slot.

use async_trait::async_trait;
use campus_common::time::{format_date, normalize_date};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::directory;
use crate::error::{ErrorBody, RegistryError, Result};
use crate::identity::Actor;
use crate::notify::{self, AttendanceAlert, Notifier};
use crate::timetable::TimetableRegistry;
use crate::upsert::{self, Ack, Outcome, UpsertTarget, Upserted};

/// Upper bound on entries in one bulk mark request
pub const MAX_BULK_ENTRIES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(RegistryError::Validation(format!(
                "invalid status '{}': expected present, absent, late or excused",
                other
            ))),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Mark request as submitted by callers
#[derive(Debug, Clone, Deserialize)]
pub struct MarkRequest {
    pub student_id: String,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub timetable_id: Option<String>,
    pub date: String,
    pub status: String,
    #[serde(default = "default_true")]
    pub send_notification: bool,
}

/// Marks for many students sharing one date and slot
#[derive(Debug, Clone, Deserialize)]
pub struct BulkMarkRequest {
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub timetable_id: Option<String>,
    pub date: String,
    #[serde(default = "default_true")]
    pub send_notification: bool,
    pub entries: Vec<BulkEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkEntry {
    pub student_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkEntryResult {
    pub student_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<Ack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkMarkSummary {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub results: Vec<BulkEntryResult>,
}

/// Uniqueness key of an attendance record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceKey {
    pub student_id: String,
    pub date: NaiveDate,
    pub timetable_slot_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    #[serde(rename = "timetable_id")]
    pub timetable_slot_id: Option<String>,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_by: String,
}

#[derive(Debug, Clone)]
struct AttendancePatch {
    status: AttendanceStatus,
    /// Class named by the caller; overwrites the stored class on update
    explicit_class_id: Option<String>,
    /// Class to use when creating (explicit, else derived from the slot)
    resolved_class_id: Option<String>,
    marked_by: String,
}

/// Owner of the `attendance` table
#[derive(Clone)]
pub struct AttendanceLedger {
    pool: SqlitePool,
    timetable: TimetableRegistry,
    notifier: Arc<dyn Notifier>,
}

impl AttendanceLedger {
    pub fn new(pool: SqlitePool, timetable: TimetableRegistry, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pool,
            timetable,
            notifier,
        }
    }

    /// Record `status` for the student on the given date and slot
    ///
    /// Repeated calls for the same key overwrite the stored status; the last
    /// writer wins. Only the find-or-create decision is race-free.
    pub async fn mark_attendance(&self, actor: &Actor, request: MarkRequest) -> Result<Ack> {
        let student_id = required("student_id", &request.student_id)?;
        let date = normalize_date(&request.date)?;
        let status: AttendanceStatus = request.status.parse()?;
        let explicit_class_id = non_blank(request.class_id);
        let timetable_slot_id = non_blank(request.timetable_id);

        let resolved_class_id = self
            .resolve_class_ref(explicit_class_id.as_deref(), timetable_slot_id.as_deref())
            .await?;
        if let Some(class_id) = &explicit_class_id {
            directory::require_class(&self.pool, class_id).await?;
        }

        let key = AttendanceKey {
            student_id,
            date,
            timetable_slot_id,
        };
        let patch = AttendancePatch {
            status,
            explicit_class_id,
            resolved_class_id,
            marked_by: actor.user_id.clone(),
        };

        let result = upsert::upsert(&AttendanceTable, &self.pool, &key, &patch).await?;

        info!(
            "Attendance {} {} {} slot {} -> {} ({:?} by {})",
            result.record.id,
            key.student_id,
            format_date(key.date),
            key.timetable_slot_id.as_deref().unwrap_or("-"),
            status,
            result.outcome,
            actor.user_id
        );

        if request.send_notification && warrants_alert(&result) {
            self.send_alert(&result);
        }

        Ok(Ack {
            id: result.record.id,
            outcome: result.outcome,
        })
    }

    /// Mark many students; every entry is an independent upsert
    pub async fn mark_bulk(&self, actor: &Actor, request: BulkMarkRequest) -> Result<BulkMarkSummary> {
        if request.entries.is_empty() {
            return Err(RegistryError::Validation("entries must not be empty".to_string()));
        }
        if request.entries.len() > MAX_BULK_ENTRIES {
            return Err(RegistryError::Validation(format!(
                "at most {} entries per request, got {}",
                MAX_BULK_ENTRIES,
                request.entries.len()
            )));
        }

        let mut summary = BulkMarkSummary {
            created: 0,
            updated: 0,
            failed: 0,
            results: Vec::with_capacity(request.entries.len()),
        };

        for entry in request.entries {
            let mark = MarkRequest {
                student_id: entry.student_id.clone(),
                class_id: request.class_id.clone(),
                timetable_id: request.timetable_id.clone(),
                date: request.date.clone(),
                status: entry.status,
                send_notification: request.send_notification,
            };

            match self.mark_attendance(actor, mark).await {
                Ok(ack) => {
                    match ack.outcome {
                        Outcome::Created => summary.created += 1,
                        Outcome::Updated => summary.updated += 1,
                    }
                    summary.results.push(BulkEntryResult {
                        student_id: entry.student_id,
                        ack: Some(ack),
                        error: None,
                    });
                }
                Err(e) => {
                    if e.is_client_error() {
                        warn!("Bulk mark entry for {} rejected: {}", entry.student_id, e);
                    } else {
                        error!("Bulk mark entry for {} failed: {:?}", entry.student_id, e);
                    }
                    summary.failed += 1;
                    summary.results.push(BulkEntryResult {
                        student_id: entry.student_id,
                        ack: None,
                        error: Some(e.body()),
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Determine the class for a record from an explicit value and a slot reference
    ///
    /// With a slot, the slot must exist and an explicit class must agree with
    /// it. Without either, returns `None`; creation then fails.
    pub async fn resolve_class_ref(
        &self,
        explicit: Option<&str>,
        slot_id: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(slot_id) = slot_id else {
            return Ok(explicit.map(str::to_string));
        };

        let slot = self
            .timetable
            .find_slot(slot_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("timetable slot not found: {}", slot_id)))?;

        if let Some(explicit) = explicit {
            if explicit != slot.class_id {
                return Err(RegistryError::Validation(format!(
                    "class_id {} does not match class {} of timetable slot {}",
                    explicit, slot.class_id, slot_id
                )));
            }
        }

        Ok(Some(slot.class_id))
    }

    /// All records of one class on one date
    pub async fn records_for_class(
        &self,
        class_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        directory::require_class(&self.pool, class_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, student_id, class_id, timetable_slot_id, attendance_date, status, marked_by
            FROM attendance
            WHERE class_id = ? AND attendance_date = ?
            ORDER BY student_id, IFNULL(timetable_slot_id, '')
            "#,
        )
        .bind(class_id)
        .bind(format_date(date))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    fn send_alert(&self, result: &Upserted<AttendanceRecord>) {
        let pool = self.pool.clone();
        let notifier = Arc::clone(&self.notifier);
        let record = result.record.clone();
        let previous_status = result.previous.as_ref().map(|p| p.status);

        tokio::spawn(async move {
            let student = match directory::find_student(&pool, &record.student_id).await {
                Ok(student) => student,
                Err(e) => {
                    warn!("Guardian lookup for {} failed: {}", record.student_id, e);
                    None
                }
            };

            let alert = AttendanceAlert {
                record_id: record.id,
                student_name: student.as_ref().map(|s| s.display_name()),
                guardian_name: student.as_ref().and_then(|s| s.parent_name.clone()),
                guardian_phone: student.and_then(|s| s.parent_phone),
                student_id: record.student_id,
                class_id: record.class_id,
                date: record.date,
                status: record.status,
                previous_status,
            };

            notify::deliver(notifier.as_ref(), &alert).await;
        });
    }
}

/// Alert on creation, or when an existing record turns absent
fn warrants_alert(result: &Upserted<AttendanceRecord>) -> bool {
    match (&result.outcome, &result.previous) {
        (Outcome::Created, _) => true,
        (Outcome::Updated, Some(previous)) => {
            result.record.status == AttendanceStatus::Absent
                && previous.status != AttendanceStatus::Absent
        }
        (Outcome::Updated, None) => false,
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn record_from_row(row: &SqliteRow) -> Result<AttendanceRecord> {
    let date: String = row.get("attendance_date");
    let status: String = row.get("status");

    Ok(AttendanceRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        class_id: row.get("class_id"),
        timetable_slot_id: row.get("timetable_slot_id"),
        date: normalize_date(&date)
            .map_err(|e| RegistryError::Internal(format!("stored attendance has {}", e)))?,
        status: status
            .parse()
            .map_err(|e| RegistryError::Internal(format!("stored attendance has {}", e)))?,
        marked_by: row.get("marked_by"),
    })
}

struct AttendanceTable;

#[async_trait]
impl UpsertTarget for AttendanceTable {
    type Key = AttendanceKey;
    type Patch = AttendancePatch;
    type Draft = AttendanceRecord;
    type Record = AttendanceRecord;

    fn entity(&self) -> &'static str {
        "attendance record"
    }

    async fn find(&self, pool: &SqlitePool, key: &AttendanceKey) -> Result<Option<AttendanceRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, student_id, class_id, timetable_slot_id, attendance_date, status, marked_by
            FROM attendance
            WHERE student_id = ?
              AND attendance_date = ?
              AND IFNULL(timetable_slot_id, '') = IFNULL(?, '')
            "#,
        )
        .bind(&key.student_id)
        .bind(format_date(key.date))
        .bind(&key.timetable_slot_id)
        .fetch_optional(pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn prepare_insert(
        &self,
        pool: &SqlitePool,
        key: &AttendanceKey,
        patch: &AttendancePatch,
    ) -> Result<AttendanceRecord> {
        let class_id = patch.resolved_class_id.clone().ok_or_else(|| {
            RegistryError::Validation("cannot determine class for new attendance record".to_string())
        })?;
        directory::require_student(pool, &key.student_id).await?;

        Ok(AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            student_id: key.student_id.clone(),
            class_id,
            timetable_slot_id: key.timetable_slot_id.clone(),
            date: key.date,
            status: patch.status,
            marked_by: patch.marked_by.clone(),
        })
    }

    async fn insert(
        &self,
        pool: &SqlitePool,
        draft: &AttendanceRecord,
    ) -> std::result::Result<AttendanceRecord, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO attendance (id, student_id, class_id, timetable_slot_id, attendance_date, status, marked_by)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.id)
        .bind(&draft.student_id)
        .bind(&draft.class_id)
        .bind(&draft.timetable_slot_id)
        .bind(format_date(draft.date))
        .bind(draft.status.as_str())
        .bind(&draft.marked_by)
        .execute(pool)
        .await?;

        Ok(draft.clone())
    }

    async fn update(
        &self,
        pool: &SqlitePool,
        existing: &AttendanceRecord,
        patch: &AttendancePatch,
    ) -> Result<Option<AttendanceRecord>> {
        let row = sqlx::query(
            r#"
            UPDATE attendance
            SET status = ?,
                marked_by = ?,
                class_id = IFNULL(?, class_id),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            RETURNING id, student_id, class_id, timetable_slot_id, attendance_date, status, marked_by
            "#,
        )
        .bind(patch.status.as_str())
        .bind(&patch.marked_by)
        .bind(&patch.explicit_class_id)
        .bind(&existing.id)
        .fetch_optional(pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }
}
