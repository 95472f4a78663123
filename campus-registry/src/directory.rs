//! Read access to the student, class and faculty directories
//!
//! These tables belong to the profile management collaborator. This crate
//! only reads them to resolve references and to join display fields; the
//! `register_*` helpers exist for provisioning tools and tests.

use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::error::{RegistryError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassEntry {
    pub id: String,
    pub name: String,
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentEntry {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub usn: Option<String>,
    pub class_id: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
}

impl StudentEntry {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacultyEntry {
    pub id: String,
    pub name: String,
    pub department: Option<String>,
}

pub async fn find_class(pool: &SqlitePool, class_id: &str) -> Result<Option<ClassEntry>> {
    let row = sqlx::query("SELECT id, name, section FROM classes WHERE id = ?")
        .bind(class_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| ClassEntry {
        id: r.get("id"),
        name: r.get("name"),
        section: r.get("section"),
    }))
}

pub async fn find_student(pool: &SqlitePool, student_id: &str) -> Result<Option<StudentEntry>> {
    let row = sqlx::query(
        r#"
        SELECT id, first_name, last_name, usn, class_id, parent_name, parent_phone
        FROM students
        WHERE id = ?
        "#,
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| StudentEntry {
        id: r.get("id"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        usn: r.get("usn"),
        class_id: r.get("class_id"),
        parent_name: r.get("parent_name"),
        parent_phone: r.get("parent_phone"),
    }))
}

pub async fn find_faculty(pool: &SqlitePool, faculty_id: &str) -> Result<Option<FacultyEntry>> {
    let row = sqlx::query("SELECT id, name, department FROM faculty WHERE id = ?")
        .bind(faculty_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| FacultyEntry {
        id: r.get("id"),
        name: r.get("name"),
        department: r.get("department"),
    }))
}

/// Fail with `NotFound` unless the class exists
pub async fn require_class(pool: &SqlitePool, class_id: &str) -> Result<ClassEntry> {
    find_class(pool, class_id)
        .await?
        .ok_or_else(|| RegistryError::NotFound(format!("class not found: {}", class_id)))
}

/// Fail with `NotFound` unless the student exists
pub async fn require_student(pool: &SqlitePool, student_id: &str) -> Result<StudentEntry> {
    find_student(pool, student_id)
        .await?
        .ok_or_else(|| RegistryError::NotFound(format!("student not found: {}", student_id)))
}

/// Fail with `NotFound` unless the faculty member exists
pub async fn require_faculty(pool: &SqlitePool, faculty_id: &str) -> Result<FacultyEntry> {
    find_faculty(pool, faculty_id)
        .await?
        .ok_or_else(|| RegistryError::NotFound(format!("faculty not found: {}", faculty_id)))
}

pub async fn register_class(pool: &SqlitePool, class: &ClassEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO classes (id, name, section)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            section = excluded.section
        "#,
    )
    .bind(&class.id)
    .bind(&class.name)
    .bind(&class.section)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn register_student(pool: &SqlitePool, student: &StudentEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO students (id, first_name, last_name, usn, class_id, parent_name, parent_phone)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            usn = excluded.usn,
            class_id = excluded.class_id,
            parent_name = excluded.parent_name,
            parent_phone = excluded.parent_phone
        "#,
    )
    .bind(&student.id)
    .bind(&student.first_name)
    .bind(&student.last_name)
    .bind(&student.usn)
    .bind(&student.class_id)
    .bind(&student.parent_name)
    .bind(&student.parent_phone)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn register_faculty(pool: &SqlitePool, faculty: &FacultyEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO faculty (id, name, department)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            department = excluded.department
        "#,
    )
    .bind(&faculty.id)
    .bind(&faculty.name)
    .bind(&faculty.department)
    .execute(pool)
    .await?;

    Ok(())
}
