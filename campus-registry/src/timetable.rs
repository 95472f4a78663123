//! TimetableRegistry: one assignment per (class, day, period)
//!
//! Re-assigning an occupied slot overwrites subject, faculty and room in
//! place. No cross-class checks are made: the same faculty member or room
//! may appear in two classes during the same period.

use async_trait::async_trait;
use campus_common::Day;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::directory;
use crate::error::{RegistryError, Result};
use crate::identity::Actor;
use crate::upsert::{self, Ack, Outcome, UpsertTarget};

/// Assignment request as submitted by callers
#[derive(Debug, Clone, Deserialize)]
pub struct SlotAssignment {
    pub class_id: String,
    pub day_of_week: String,
    pub period_number: i64,
    pub subject: String,
    pub faculty_id: String,
    pub room_number: String,
}

/// Uniqueness key of a timetable slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotKey {
    pub class_id: String,
    pub day: Day,
    pub period: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimetableSlot {
    pub id: String,
    pub class_id: String,
    #[serde(rename = "day_of_week")]
    pub day: Day,
    #[serde(rename = "period_number")]
    pub period: u32,
    pub subject: String,
    pub faculty_id: String,
    pub room_number: String,
}

/// Faculty dashboard row: a slot joined with its class display fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacultySlotSummary {
    pub id: String,
    pub day_of_week: Day,
    pub period_number: u32,
    pub subject: String,
    pub faculty_id: String,
    pub room_number: String,
    pub class_id: String,
    pub class_name: Option<String>,
    pub section: Option<String>,
}

#[derive(Debug, Clone)]
struct SlotPatch {
    subject: String,
    faculty_id: String,
    room_number: String,
}

/// Owner of the `timetable_slots` table
#[derive(Clone)]
pub struct TimetableRegistry {
    pool: SqlitePool,
    periods_per_day: u32,
}

impl TimetableRegistry {
    pub fn new(pool: SqlitePool, periods_per_day: u32) -> Self {
        Self {
            pool,
            periods_per_day,
        }
    }

    pub fn periods_per_day(&self) -> u32 {
        self.periods_per_day
    }

    /// Create or overwrite the assignment for (class, day, period)
    pub async fn assign_slot(&self, actor: &Actor, assignment: SlotAssignment) -> Result<Ack> {
        let (key, patch) = self.validate(assignment)?;

        directory::require_class(&self.pool, &key.class_id).await?;
        directory::require_faculty(&self.pool, &patch.faculty_id).await?;

        let result = upsert::upsert(&SlotTable, &self.pool, &key, &patch).await?;

        info!(
            "Timetable slot {} {} {} period {} -> {} / {} / room {} ({:?} by {})",
            result.record.id,
            key.class_id,
            key.day,
            key.period,
            patch.subject,
            patch.faculty_id,
            patch.room_number,
            result.outcome,
            actor.user_id
        );

        Ok(Ack {
            id: result.record.id,
            outcome: result.outcome,
        })
    }

    /// Read interface used to derive a class from a slot reference
    pub async fn find_slot(&self, slot_id: &str) -> Result<Option<TimetableSlot>> {
        let row = sqlx::query(
            r#"
            SELECT id, class_id, day, period, subject, faculty_id, room_number
            FROM timetable_slots
            WHERE id = ?
            "#,
        )
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(slot_from_row).transpose()
    }

    /// Every slot taught by `faculty_id`, joined with class name and section
    ///
    /// Ordered by day, period, then class. Unknown faculty yields an empty list.
    pub async fn slots_for_faculty(&self, faculty_id: &str) -> Result<Vec<FacultySlotSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.class_id, t.day, t.period, t.subject, t.faculty_id, t.room_number,
                   c.name AS class_name, c.section AS section
            FROM timetable_slots t
            LEFT JOIN classes c ON c.id = t.class_id
            WHERE t.faculty_id = ?
            ORDER BY t.day, t.period, t.class_id
            "#,
        )
        .bind(faculty_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let slot = slot_from_row(row)?;
                Ok(FacultySlotSummary {
                    id: slot.id,
                    day_of_week: slot.day,
                    period_number: slot.period,
                    subject: slot.subject,
                    faculty_id: slot.faculty_id,
                    room_number: slot.room_number,
                    class_id: slot.class_id,
                    class_name: row.get("class_name"),
                    section: row.get("section"),
                })
            })
            .collect()
    }

    /// Weekly timetable of one class, ordered by day then period
    pub async fn slots_for_class(&self, class_id: &str) -> Result<Vec<TimetableSlot>> {
        directory::require_class(&self.pool, class_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, class_id, day, period, subject, faculty_id, room_number
            FROM timetable_slots
            WHERE class_id = ?
            ORDER BY day, period
            "#,
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(slot_from_row).collect()
    }

    fn validate(&self, assignment: SlotAssignment) -> Result<(SlotKey, SlotPatch)> {
        let class_id = required("class_id", &assignment.class_id)?;
        let faculty_id = required("faculty_id", &assignment.faculty_id)?;
        let subject = required("subject", &assignment.subject)?;
        let room_number = required("room_number", &assignment.room_number)?;

        let day: Day = assignment.day_of_week.parse()?;

        let period = u32::try_from(assignment.period_number)
            .ok()
            .filter(|p| (1..=self.periods_per_day).contains(p))
            .ok_or_else(|| {
                RegistryError::Validation(format!(
                    "period_number must be between 1 and {}, got {}",
                    self.periods_per_day, assignment.period_number
                ))
            })?;

        Ok((
            SlotKey {
                class_id,
                day,
                period,
            },
            SlotPatch {
                subject,
                faculty_id,
                room_number,
            },
        ))
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn slot_from_row(row: &SqliteRow) -> Result<TimetableSlot> {
    let day_number: i64 = row.get("day");
    let period: i64 = row.get("period");

    Ok(TimetableSlot {
        id: row.get("id"),
        class_id: row.get("class_id"),
        day: Day::from_number(day_number)
            .map_err(|e| RegistryError::Internal(format!("stored slot has {}", e)))?,
        period: u32::try_from(period).map_err(|_| {
            RegistryError::Internal(format!("stored slot has invalid period {}", period))
        })?,
        subject: row.get("subject"),
        faculty_id: row.get("faculty_id"),
        room_number: row.get("room_number"),
    })
}

struct SlotTable;

#[async_trait]
impl UpsertTarget for SlotTable {
    type Key = SlotKey;
    type Patch = SlotPatch;
    type Draft = TimetableSlot;
    type Record = TimetableSlot;

    fn entity(&self) -> &'static str {
        "timetable slot"
    }

    async fn find(&self, pool: &SqlitePool, key: &SlotKey) -> Result<Option<TimetableSlot>> {
        let row = sqlx::query(
            r#"
            SELECT id, class_id, day, period, subject, faculty_id, room_number
            FROM timetable_slots
            WHERE class_id = ? AND day = ? AND period = ?
            "#,
        )
        .bind(&key.class_id)
        .bind(key.day.number())
        .bind(i64::from(key.period))
        .fetch_optional(pool)
        .await?;

        row.as_ref().map(slot_from_row).transpose()
    }

    async fn prepare_insert(
        &self,
        _pool: &SqlitePool,
        key: &SlotKey,
        patch: &SlotPatch,
    ) -> Result<TimetableSlot> {
        Ok(TimetableSlot {
            id: Uuid::new_v4().to_string(),
            class_id: key.class_id.clone(),
            day: key.day,
            period: key.period,
            subject: patch.subject.clone(),
            faculty_id: patch.faculty_id.clone(),
            room_number: patch.room_number.clone(),
        })
    }

    async fn insert(
        &self,
        pool: &SqlitePool,
        draft: &TimetableSlot,
    ) -> std::result::Result<TimetableSlot, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO timetable_slots (id, class_id, day, period, subject, faculty_id, room_number)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.id)
        .bind(&draft.class_id)
        .bind(draft.day.number())
        .bind(i64::from(draft.period))
        .bind(&draft.subject)
        .bind(&draft.faculty_id)
        .bind(&draft.room_number)
        .execute(pool)
        .await?;

        Ok(draft.clone())
    }

    async fn update(
        &self,
        pool: &SqlitePool,
        existing: &TimetableSlot,
        patch: &SlotPatch,
    ) -> Result<Option<TimetableSlot>> {
        let row = sqlx::query(
            r#"
            UPDATE timetable_slots
            SET subject = ?, faculty_id = ?, room_number = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            RETURNING id, class_id, day, period, subject, faculty_id, room_number
            "#,
        )
        .bind(&patch.subject)
        .bind(&patch.faculty_id)
        .bind(&patch.room_number)
        .bind(&existing.id)
        .fetch_optional(pool)
        .await?;

        row.as_ref().map(slot_from_row).transpose()
    }
}
