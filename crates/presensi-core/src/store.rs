//! The `AttendanceStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `presensi-store-sqlite`). The gateway and the admin API depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::{
  card::{Card, CardUpdate},
  device::{Device, NewDevice},
  presence::{NewPresence, Presence},
  schedule::{NewSchedule, Schedule},
  subject::{Subject, SubjectRef},
};

// ─── Write outcome ───────────────────────────────────────────────────────────

/// Outcome of a write guarded by a uniqueness constraint.
///
/// A collision is an expected domain outcome (a second tap on the same day, a
/// card enrolled twice), so it is reported as a value rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unique<T> {
  Stored(T),
  Duplicate,
}

impl<T> Unique<T> {
  pub fn stored(self) -> Option<T> {
    match self {
      Self::Stored(t) => Some(t),
      Self::Duplicate => None,
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Presensi store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum` and `rumqttc`).
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  fn add_subject(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject by UUID. Returns `None` if not found.
  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  // ── Device registry ───────────────────────────────────────────────────

  /// Persist a device. The input must already be
  /// [`normalized`](NewDevice::normalized). A taken name yields
  /// [`Unique::Duplicate`].
  fn create_device(
    &self,
    input: NewDevice,
  ) -> impl Future<Output = Result<Unique<Device>, Self::Error>> + Send + '_;

  /// Replace a device's name and modes. `None` if the device does not exist.
  fn update_device(
    &self,
    id: Uuid,
    input: NewDevice,
  ) -> impl Future<Output = Result<Option<Unique<Device>>, Self::Error>> + Send + '_;

  /// Delete a device and its modes. Returns `false` if it did not exist.
  fn delete_device(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_device(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Device>, Self::Error>> + Send + '_;

  /// Every device with its ordered modes; the source of the desired topic set.
  fn list_devices_with_modes(
    &self,
  ) -> impl Future<Output = Result<Vec<Device>, Self::Error>> + Send + '_;

  // ── Schedules ─────────────────────────────────────────────────────────

  /// Persist a schedule. The input must already be
  /// [`validate`](NewSchedule::validate)d.
  fn create_schedule(
    &self,
    input: NewSchedule,
  ) -> impl Future<Output = Result<Schedule, Self::Error>> + Send + '_;

  fn get_schedule(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Schedule>, Self::Error>> + Send + '_;

  fn list_schedules(
    &self,
  ) -> impl Future<Output = Result<Vec<Schedule>, Self::Error>> + Send + '_;

  /// The schedule whose window contains the time of day of `now`. When
  /// windows overlap the earliest `start_presence` wins.
  fn get_active_schedule(
    &self,
    now: NaiveDateTime,
  ) -> impl Future<Output = Result<Option<Schedule>, Self::Error>> + Send + '_;

  // ── Cards ─────────────────────────────────────────────────────────────

  fn get_card_by_uid<'a>(
    &'a self,
    uid: &'a str,
  ) -> impl Future<Output = Result<Option<Card>, Self::Error>> + Send + 'a;

  /// Enrol an unassigned, inactive card. An existing uid yields
  /// [`Unique::Duplicate`].
  fn create_card(
    &self,
    uid: String,
  ) -> impl Future<Output = Result<Unique<Card>, Self::Error>> + Send + '_;

  /// Apply an administrative update. `None` if the card does not exist.
  fn update_card(
    &self,
    uid: String,
    update: CardUpdate,
  ) -> impl Future<Output = Result<Option<Card>, Self::Error>> + Send + '_;

  fn list_cards(
    &self,
  ) -> impl Future<Output = Result<Vec<Card>, Self::Error>> + Send + '_;

  // ── Presences ─────────────────────────────────────────────────────────

  /// Insert one presence row. A row for the same subject, schedule and
  /// `presence_date` yields [`Unique::Duplicate`]; the existing row is left
  /// untouched.
  fn create_presence(
    &self,
    input: NewPresence,
  ) -> impl Future<Output = Result<Unique<Presence>, Self::Error>> + Send + '_;

  /// Insert many rows in one transaction, skipping rows that collide with an
  /// existing one. Returns the number of rows inserted.
  fn bulk_create_presences(
    &self,
    inputs: Vec<NewPresence>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Subjects with no presence row of any status for `schedule_id` on `date`.
  fn list_subjects_missing_presence(
    &self,
    schedule_id: Uuid,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<SubjectRef>, Self::Error>> + Send + '_;

  fn list_presences(
    &self,
    date: NaiveDate,
    schedule_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Presence>, Self::Error>> + Send + '_;
}
