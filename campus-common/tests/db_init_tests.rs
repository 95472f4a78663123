//! Tests for database initialization
//!
//! - Database file is created when missing
//! - Re-opening an existing database is idempotent
//! - Uniqueness keys on the owned tables are enforced by storage

use campus_common::db::{init_database, PoolSettings, SCHEMA_VERSION};
use sqlx::SqlitePool;

async fn fresh_pool(dir: &tempfile::TempDir) -> SqlitePool {
    init_database(&dir.path().join("campus.db"), PoolSettings::default())
        .await
        .expect("database should initialize")
}

async fn seed_directories(pool: &SqlitePool) {
    sqlx::query("INSERT INTO classes (id, name, section) VALUES ('C2', 'Grade 7', 'B')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO students (id, first_name, last_name) VALUES ('S1', 'Asha', 'Rao')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO faculty (id, name) VALUES ('F9', 'M. Iyer')")
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("campus.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path, PoolSettings::default()).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("campus.db");

    let first = init_database(&db_path, PoolSettings::default()).await.unwrap();
    first.close().await;

    let second = init_database(&db_path, PoolSettings::default()).await;
    assert!(second.is_ok(), "Failed to open existing database: {:?}", second.err());

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version WHERE version = ?")
        .bind(SCHEMA_VERSION)
        .fetch_one(&second.unwrap())
        .await
        .unwrap();
    assert_eq!(versions, 1);
}

#[tokio::test]
async fn test_timetable_key_is_unique() {
    let dir = tempfile::tempdir().unwrap();
    let pool = fresh_pool(&dir).await;
    seed_directories(&pool).await;

    let insert = "INSERT INTO timetable_slots (id, class_id, day, period, subject, faculty_id, room_number)
                  VALUES (?, 'C2', 1, 3, 'Math', 'F9', '204')";

    sqlx::query(insert).bind("T1").execute(&pool).await.unwrap();
    let err = sqlx::query(insert).bind("T2").execute(&pool).await.unwrap_err();

    let db_err = err.as_database_error().expect("should be a database error");
    assert!(db_err.is_unique_violation());
}

#[tokio::test]
async fn test_attendance_key_without_slot_is_unique() {
    let dir = tempfile::tempdir().unwrap();
    let pool = fresh_pool(&dir).await;
    seed_directories(&pool).await;

    let insert = "INSERT INTO attendance (id, student_id, class_id, timetable_slot_id, attendance_date, status, marked_by)
                  VALUES (?, 'S1', 'C2', NULL, '2024-03-01', 'present', 'U1')";

    sqlx::query(insert).bind("A1").execute(&pool).await.unwrap();
    let err = sqlx::query(insert).bind("A2").execute(&pool).await.unwrap_err();

    let db_err = err.as_database_error().expect("should be a database error");
    assert!(db_err.is_unique_violation());
}

#[tokio::test]
async fn test_foreign_keys_enforced_on_every_connection() {
    let dir = tempfile::tempdir().unwrap();
    let pool = fresh_pool(&dir).await;

    // Acquire several connections so the check is not limited to the first one
    for _ in 0..3 {
        let mut conn = pool.acquire().await.unwrap();
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }
}

#[tokio::test]
async fn test_invalid_status_rejected_by_storage() {
    let dir = tempfile::tempdir().unwrap();
    let pool = fresh_pool(&dir).await;
    seed_directories(&pool).await;

    let result = sqlx::query(
        "INSERT INTO attendance (id, student_id, class_id, attendance_date, status, marked_by)
         VALUES ('A1', 'S1', 'C2', '2024-03-01', 'asleep', 'U1')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}
