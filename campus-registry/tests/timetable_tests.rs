//! TimetableRegistry against a real database

mod common;

use campus_common::Day;
use campus_registry::identity::{Actor, Role};
use campus_registry::timetable::{SlotAssignment, TimetableRegistry};
use campus_registry::{Outcome, RegistryError};
use common::{setup_db, slot_count, PERIODS_PER_DAY};

fn hod() -> Actor {
    Actor::new("U-hod", Role::Hod)
}

fn assignment(class: &str, day: &str, period: i64, subject: &str, faculty: &str, room: &str) -> SlotAssignment {
    SlotAssignment {
        class_id: class.to_string(),
        day_of_week: day.to_string(),
        period_number: period,
        subject: subject.to_string(),
        faculty_id: faculty.to_string(),
        room_number: room.to_string(),
    }
}

#[tokio::test]
async fn test_reassignment_overwrites_in_place() {
    let db = setup_db().await;
    let registry = TimetableRegistry::new(db.pool.clone(), PERIODS_PER_DAY);
    let before = slot_count(&db.pool).await;

    let created = registry
        .assign_slot(&hod(), assignment("C2", "Tuesday", 3, "Math", "F9", "204"))
        .await
        .unwrap();
    assert_eq!(created.outcome, Outcome::Created);

    let updated = registry
        .assign_slot(&hod(), assignment("C2", "tue", 3, "Physics", "F4", "105"))
        .await
        .unwrap();
    assert_eq!(updated.outcome, Outcome::Updated);
    assert_eq!(updated.id, created.id);

    assert_eq!(slot_count(&db.pool).await, before + 1);

    let slot = registry.find_slot(&created.id).await.unwrap().unwrap();
    assert_eq!(slot.day, Day::Tuesday);
    assert_eq!(slot.period, 3);
    assert_eq!(slot.subject, "Physics");
    assert_eq!(slot.faculty_id, "F4");
    assert_eq!(slot.room_number, "105");
}

#[tokio::test]
async fn test_seeded_slot_is_reassigned_not_duplicated() {
    let db = setup_db().await;
    let registry = TimetableRegistry::new(db.pool.clone(), PERIODS_PER_DAY);

    let ack = registry
        .assign_slot(&hod(), assignment("C2", "Monday", 3, "Math", "F4", "204"))
        .await
        .unwrap();

    assert_eq!(ack.id, "T7");
    assert_eq!(ack.outcome, Outcome::Updated);
    assert_eq!(slot_count(&db.pool).await, 1);

    let slot = registry.find_slot("T7").await.unwrap().unwrap();
    assert_eq!(slot.faculty_id, "F4");
}

#[tokio::test]
async fn test_same_period_in_other_class_is_a_new_slot() {
    let db = setup_db().await;
    let registry = TimetableRegistry::new(db.pool.clone(), PERIODS_PER_DAY);

    // Faculty double-booking across classes is not checked
    let ack = registry
        .assign_slot(&hod(), assignment("C3", "Monday", 3, "Math", "F9", "204"))
        .await
        .unwrap();
    assert_eq!(ack.outcome, Outcome::Created);
    assert_eq!(slot_count(&db.pool).await, 2);
}

#[tokio::test]
async fn test_invalid_assignments() {
    let db = setup_db().await;
    let registry = TimetableRegistry::new(db.pool.clone(), PERIODS_PER_DAY);

    for bad in [
        assignment("C2", "Funday", 1, "Math", "F9", "204"),
        assignment("C2", "Monday", 0, "Math", "F9", "204"),
        assignment("C2", "Monday", 9, "Math", "F9", "204"),
        assignment("C2", "Monday", -2, "Math", "F9", "204"),
        assignment("C2", "Monday", 1, " ", "F9", "204"),
    ] {
        let err = registry.assign_slot(&hod(), bad).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)), "got {:?}", err);
    }

    let err = registry
        .assign_slot(&hod(), assignment("C404", "Monday", 1, "Math", "F9", "204"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));

    let err = registry
        .assign_slot(&hod(), assignment("C2", "Monday", 1, "Math", "F404", "204"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));

    assert_eq!(slot_count(&db.pool).await, 1);
}

#[tokio::test]
async fn test_faculty_slots_are_joined_and_ordered() {
    let db = setup_db().await;
    let registry = TimetableRegistry::new(db.pool.clone(), PERIODS_PER_DAY);

    for (class, day, period) in [("C3", "Wednesday", 1), ("C2", "Monday", 5), ("C3", "Monday", 3)] {
        registry
            .assign_slot(&hod(), assignment(class, day, period, "Math", "F9", "204"))
            .await
            .unwrap();
    }
    registry
        .assign_slot(&hod(), assignment("C2", "Friday", 2, "Art", "F4", "12"))
        .await
        .unwrap();

    let slots = registry.slots_for_faculty("F9").await.unwrap();
    let order: Vec<(Day, u32, &str)> = slots
        .iter()
        .map(|s| (s.day_of_week, s.period_number, s.class_id.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (Day::Monday, 3, "C2"),
            (Day::Monday, 3, "C3"),
            (Day::Monday, 5, "C2"),
            (Day::Wednesday, 1, "C3"),
        ]
    );

    let first = &slots[0];
    assert_eq!(first.class_name.as_deref(), Some("Grade 10"));
    assert_eq!(first.section.as_deref(), Some("A"));

    assert!(registry.slots_for_faculty("F404").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_class_timetable() {
    let db = setup_db().await;
    let registry = TimetableRegistry::new(db.pool.clone(), PERIODS_PER_DAY);

    registry
        .assign_slot(&hod(), assignment("C2", "Sunday", 1, "Music", "F4", "1"))
        .await
        .unwrap();

    let slots = registry.slots_for_class("C2").await.unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].id, "T7");
    assert_eq!(slots[1].day, Day::Sunday);

    let err = registry.slots_for_class("C404").await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
}
