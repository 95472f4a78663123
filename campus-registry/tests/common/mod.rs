//! Shared fixtures: a file-backed database seeded with a small school

#![allow(dead_code)]

use async_trait::async_trait;
use campus_common::db::{init_database, PoolSettings};
use campus_registry::directory::{self, ClassEntry, FacultyEntry, StudentEntry};
use campus_registry::notify::{AttendanceAlert, Notifier};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const PERIODS_PER_DAY: u32 = 8;

/// Keeps the temp dir alive for the lifetime of the pool
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("campus.db"), PoolSettings::default())
        .await
        .unwrap();
    seed(&pool).await;
    TestDb { pool, _dir: dir }
}

async fn seed(pool: &SqlitePool) {
    for (id, name, section) in [("C2", "Grade 10", "A"), ("C3", "Grade 9", "B")] {
        directory::register_class(
            pool,
            &ClassEntry {
                id: id.to_string(),
                name: name.to_string(),
                section: Some(section.to_string()),
            },
        )
        .await
        .unwrap();
    }

    for (id, name) in [("F9", "Ada Kumar"), ("F4", "Ravi Shah")] {
        directory::register_faculty(
            pool,
            &FacultyEntry {
                id: id.to_string(),
                name: name.to_string(),
                department: Some("Mathematics".to_string()),
            },
        )
        .await
        .unwrap();
    }

    for n in 1..=12 {
        directory::register_student(
            pool,
            &StudentEntry {
                id: format!("S{}", n),
                first_name: "Student".to_string(),
                last_name: format!("{}", n),
                usn: Some(format!("USN{:03}", n)),
                class_id: Some("C2".to_string()),
                parent_name: Some(format!("Parent {}", n)),
                parent_phone: Some(format!("+91-900000{:04}", n)),
            },
        )
        .await
        .unwrap();
    }

    // Slot with a fixed id so attendance can reference it directly
    sqlx::query(
        r#"
        INSERT INTO timetable_slots (id, class_id, day, period, subject, faculty_id, room_number)
        VALUES ('T7', 'C2', 1, 3, 'Math', 'F9', '204')
        "#,
    )
    .execute(pool)
    .await
    .unwrap();
}

pub async fn attendance_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM attendance")
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn slot_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM timetable_slots")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Forwards every alert into a channel for inspection
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<AttendanceAlert>,
}

pub fn channel_notifier() -> (Arc<dyn Notifier>, mpsc::UnboundedReceiver<AttendanceAlert>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelNotifier { tx }), rx)
}

#[async_trait]
impl Notifier for ChannelNotifier {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn notify(&self, alert: &AttendanceAlert) -> anyhow::Result<()> {
        self.tx.send(alert.clone())?;
        Ok(())
    }
}

pub async fn next_alert(rx: &mut mpsc::UnboundedReceiver<AttendanceAlert>) -> Option<AttendanceAlert> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .ok()
        .flatten()
}

/// True when no alert arrives within a short window
pub async fn no_alert(rx: &mut mpsc::UnboundedReceiver<AttendanceAlert>) -> bool {
    tokio::time::timeout(Duration::from_millis(200), rx.recv())
        .await
        .is_err()
}
