//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, NaiveTime};
use presensi_core::{
  card::CardUpdate,
  device::{Mode, NewDevice},
  presence::{CreatorKind, NewPresence, PresenceStatus},
  schedule::{NewSchedule, Schedule},
  store::{AttendanceStore, Unique},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t(h: u32, m: u32) -> NaiveTime { NaiveTime::from_hms_opt(h, m, 0).unwrap() }

fn day() -> NaiveDate { NaiveDate::from_ymd_opt(2026, 10, 19).unwrap() }

async fn morning(s: &SqliteStore) -> Schedule {
  s.create_schedule(NewSchedule {
    name:           "Morning".into(),
    start_presence: t(7, 0),
    start_time:     t(7, 30),
    finish_time:    t(15, 0),
  })
  .await
  .unwrap()
}

fn tap(subject_id: Uuid, schedule: &Schedule, status: PresenceStatus) -> NewPresence {
  NewPresence {
    subject_id,
    schedule_id:   schedule.schedule_id,
    schedule_name: schedule.name.clone(),
    status,
    note:          None,
    created_by:    CreatorKind::Tap,
    presence_date: day(),
  }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_subject() {
  let s = store().await;

  let subject = s.add_subject("Siti".into()).await.unwrap();
  let fetched = s.get_subject(subject.subject_id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "Siti");
  assert_eq!(fetched.subject_id, subject.subject_id);

  assert!(s.get_subject(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Devices ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn device_modes_keep_their_order() {
  let s = store().await;

  let created = s
    .create_device(NewDevice {
      name:  "D1".into(),
      modes: vec![Mode::Ping, Mode::Presence, Mode::Record],
    })
    .await
    .unwrap()
    .stored()
    .unwrap();

  let fetched = s.get_device(created.device_id).await.unwrap().unwrap();
  assert_eq!(fetched.modes, vec![Mode::Ping, Mode::Presence, Mode::Record]);
}

#[tokio::test]
async fn duplicate_device_name_is_reported() {
  let s = store().await;
  let input = NewDevice { name: "D1".into(), modes: vec![Mode::Presence] };

  assert!(matches!(s.create_device(input.clone()).await.unwrap(), Unique::Stored(_)));
  assert_eq!(s.create_device(input).await.unwrap(), Unique::Duplicate);
  assert_eq!(s.list_devices_with_modes().await.unwrap().len(), 1);
}

#[tokio::test]
async fn device_without_modes_is_still_listed() {
  let s = store().await;
  s.create_device(NewDevice { name: "idle".into(), modes: vec![] })
    .await
    .unwrap();

  let devices = s.list_devices_with_modes().await.unwrap();
  assert_eq!(devices.len(), 1);
  assert!(devices[0].modes.is_empty());
}

#[tokio::test]
async fn update_device_replaces_modes() {
  let s = store().await;
  let d = s
    .create_device(NewDevice { name: "D1".into(), modes: vec![Mode::Presence] })
    .await
    .unwrap()
    .stored()
    .unwrap();

  let updated = s
    .update_device(d.device_id, NewDevice {
      name:  "D1-lobby".into(),
      modes: vec![Mode::Record, Mode::Ping],
    })
    .await
    .unwrap()
    .unwrap()
    .stored()
    .unwrap();
  assert_eq!(updated.name, "D1-lobby");
  assert_eq!(updated.created_at, d.created_at);

  let listed = s.list_devices_with_modes().await.unwrap();
  assert_eq!(listed[0].modes, vec![Mode::Record, Mode::Ping]);

  let missing = s
    .update_device(Uuid::new_v4(), NewDevice { name: "x".into(), modes: vec![] })
    .await
    .unwrap();
  assert!(missing.is_none());
}

#[tokio::test]
async fn update_device_to_taken_name_changes_nothing() {
  let s = store().await;
  s.create_device(NewDevice { name: "D1".into(), modes: vec![Mode::Presence] })
    .await
    .unwrap();
  let d2 = s
    .create_device(NewDevice { name: "D2".into(), modes: vec![Mode::Ping] })
    .await
    .unwrap()
    .stored()
    .unwrap();

  let outcome = s
    .update_device(d2.device_id, NewDevice { name: "D1".into(), modes: vec![] })
    .await
    .unwrap();
  assert_eq!(outcome, Some(Unique::Duplicate));

  let d2_after = s.get_device(d2.device_id).await.unwrap().unwrap();
  assert_eq!(d2_after.name, "D2");
  assert_eq!(d2_after.modes, vec![Mode::Ping]);
}

#[tokio::test]
async fn delete_device_cascades_modes() {
  let s = store().await;
  let d = s
    .create_device(NewDevice { name: "D1".into(), modes: vec![Mode::Presence] })
    .await
    .unwrap()
    .stored()
    .unwrap();

  assert!(s.delete_device(d.device_id).await.unwrap());
  assert!(!s.delete_device(d.device_id).await.unwrap());
  assert!(s.list_devices_with_modes().await.unwrap().is_empty());

  // The name is free again.
  let again = s
    .create_device(NewDevice { name: "D1".into(), modes: vec![Mode::Presence] })
    .await
    .unwrap();
  assert!(matches!(again, Unique::Stored(_)));
}

// ─── Schedules ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn active_schedule_matches_time_of_day() {
  let s = store().await;
  let m = morning(&s).await;

  let at = |h, min| day().and_time(t(h, min));
  assert_eq!(s.get_active_schedule(at(7, 15)).await.unwrap(), Some(m.clone()));
  assert_eq!(s.get_active_schedule(at(7, 0)).await.unwrap(), Some(m.clone()));
  assert_eq!(s.get_active_schedule(at(15, 0)).await.unwrap(), Some(m));
  assert!(s.get_active_schedule(at(6, 59)).await.unwrap().is_none());
  assert!(s.get_active_schedule(at(15, 1)).await.unwrap().is_none());
}

#[tokio::test]
async fn overlapping_windows_prefer_earliest_start() {
  let s = store().await;
  let m = morning(&s).await;
  s.create_schedule(NewSchedule {
    name:           "Second shift".into(),
    start_presence: t(12, 0),
    start_time:     t(12, 30),
    finish_time:    t(20, 0),
  })
  .await
  .unwrap();

  let active = s.get_active_schedule(day().and_time(t(13, 0))).await.unwrap();
  assert_eq!(active.unwrap().schedule_id, m.schedule_id);
}

#[tokio::test]
async fn invalid_window_is_rejected_before_insert() {
  let s = store().await;
  let result = s
    .create_schedule(NewSchedule {
      name:           "Backwards".into(),
      start_presence: t(8, 0),
      start_time:     t(7, 30),
      finish_time:    t(15, 0),
    })
    .await;
  assert!(matches!(result, Err(crate::Error::Core(_))));
  assert!(s.list_schedules().await.unwrap().is_empty());
}

// ─── Cards ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn enrolled_card_starts_inactive_and_unassigned() {
  let s = store().await;

  let card = s.create_card("ABC123".into()).await.unwrap().stored().unwrap();
  assert!(!card.is_active);
  assert!(card.subject_id.is_none());

  assert_eq!(s.create_card("ABC123".into()).await.unwrap(), Unique::Duplicate);
  assert_eq!(s.get_card_by_uid("ABC123").await.unwrap(), Some(card));
  assert!(s.get_card_by_uid("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn update_card_applies_only_given_fields() {
  let s = store().await;
  let subject = s.add_subject("Siti".into()).await.unwrap();
  s.create_card("ABC123".into()).await.unwrap();

  let assigned = s
    .update_card("ABC123".into(), CardUpdate {
      subject_id: Some(subject.subject_id),
      is_active:  Some(true),
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(assigned.subject_id, Some(subject.subject_id));
  assert!(assigned.is_active);

  let deactivated = s
    .update_card("ABC123".into(), CardUpdate { subject_id: None, is_active: Some(false) })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(deactivated.subject_id, Some(subject.subject_id));
  assert!(!deactivated.is_active);

  let missing = s.update_card("nope".into(), CardUpdate::default()).await.unwrap();
  assert!(missing.is_none());
}

// ─── Presences ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn presence_is_unique_per_subject_schedule_and_day() {
  let s = store().await;
  let m = morning(&s).await;
  let subject = s.add_subject("Siti".into()).await.unwrap();

  let first = s
    .create_presence(tap(subject.subject_id, &m, PresenceStatus::Present))
    .await
    .unwrap()
    .stored()
    .unwrap();
  assert_eq!(first.subject_name, "Siti");
  assert_eq!(first.schedule_name, "Morning");
  assert_eq!(first.presence_date, day());

  let second = s
    .create_presence(tap(subject.subject_id, &m, PresenceStatus::Late))
    .await
    .unwrap();
  assert_eq!(second, Unique::Duplicate);

  // The first row was not overwritten.
  let rows = s.list_presences(day(), Some(m.schedule_id)).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].status, PresenceStatus::Present);
}

#[tokio::test]
async fn same_subject_may_tap_on_another_day() {
  let s = store().await;
  let m = morning(&s).await;
  let subject = s.add_subject("Siti".into()).await.unwrap();

  s.create_presence(tap(subject.subject_id, &m, PresenceStatus::Present))
    .await
    .unwrap();
  let mut tomorrow = tap(subject.subject_id, &m, PresenceStatus::Late);
  tomorrow.presence_date = day().succ_opt().unwrap();
  assert!(matches!(s.create_presence(tomorrow).await.unwrap(), Unique::Stored(_)));
}

#[tokio::test]
async fn missing_presence_excludes_any_status() {
  let s = store().await;
  let m = morning(&s).await;
  let present = s.add_subject("Ani".into()).await.unwrap();
  let sick = s.add_subject("Budi".into()).await.unwrap();
  let absent = s.add_subject("Citra".into()).await.unwrap();

  s.create_presence(tap(present.subject_id, &m, PresenceStatus::Present))
    .await
    .unwrap();
  let mut note = tap(sick.subject_id, &m, PresenceStatus::Sick);
  note.created_by = CreatorKind::Admin;
  s.create_presence(note).await.unwrap();

  let missing = s
    .list_subjects_missing_presence(m.schedule_id, day())
    .await
    .unwrap();
  assert_eq!(missing.len(), 1);
  assert_eq!(missing[0].subject_id, absent.subject_id);
  assert_eq!(missing[0].name, "Citra");
}

#[tokio::test]
async fn bulk_insert_skips_existing_rows() {
  let s = store().await;
  let m = morning(&s).await;
  let a = s.add_subject("Ani".into()).await.unwrap();
  let b = s.add_subject("Budi".into()).await.unwrap();

  s.create_presence(tap(a.subject_id, &m, PresenceStatus::Late))
    .await
    .unwrap();

  let batch = vec![
    tap(a.subject_id, &m, PresenceStatus::Alpha),
    tap(b.subject_id, &m, PresenceStatus::Alpha),
  ];
  assert_eq!(s.bulk_create_presences(batch).await.unwrap(), 1);
  assert_eq!(s.bulk_create_presences(vec![]).await.unwrap(), 0);

  let rows = s.list_presences(day(), None).await.unwrap();
  assert_eq!(rows.len(), 2);
  let ani = rows.iter().find(|p| p.subject_id == a.subject_id).unwrap();
  assert_eq!(ani.status, PresenceStatus::Late);
  let budi = rows.iter().find(|p| p.subject_id == b.subject_id).unwrap();
  assert_eq!(budi.status, PresenceStatus::Alpha);
}
