//! [`SqliteStore`]: the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use presensi_core::{
  card::{Card, CardUpdate},
  device::{Device, NewDevice},
  presence::{NewPresence, Presence},
  schedule::{NewSchedule, Schedule},
  store::{AttendanceStore, Unique},
  subject::{Subject, SubjectRef},
};

use crate::{
  Result,
  encode::{
    RawCard, RawDeviceMode, RawPresence, RawSchedule, RawSubject, decode_dt,
    decode_mode, decode_uuid, encode_date, encode_dt, encode_time, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Whether `e` is a UNIQUE or PRIMARY KEY constraint failure.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

fn insert_modes(
  conn: &rusqlite::Connection,
  device_id: &str,
  modes: &[String],
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO device_modes (device_id, mode, position) VALUES (?1, ?2, ?3)",
  )?;
  for (position, mode) in modes.iter().enumerate() {
    stmt.execute(rusqlite::params![device_id, mode, position as i64])?;
  }
  Ok(())
}

/// Fold `devices LEFT JOIN device_modes` rows (ordered by device, then mode
/// position) into devices.
fn fold_devices(raws: Vec<RawDeviceMode>) -> Result<Vec<Device>> {
  let mut devices: Vec<Device> = Vec::new();
  for raw in raws {
    let device_id = decode_uuid(&raw.device_id)?;
    let start_new = devices.last().is_none_or(|d| d.device_id != device_id);
    if start_new {
      devices.push(Device {
        device_id,
        name: raw.name,
        modes: Vec::new(),
        created_at: decode_dt(&raw.created_at)?,
      });
    }
    if let (Some(mode), Some(device)) = (raw.mode, devices.last_mut()) {
      device.modes.push(decode_mode(&mode)?);
    }
  }
  Ok(devices)
}

const DEVICE_SELECT: &str = "SELECT d.device_id, d.name, d.created_at, m.mode
   FROM devices d
   LEFT JOIN device_modes m ON m.device_id = d.device_id";

fn device_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDeviceMode> {
  Ok(RawDeviceMode {
    device_id:  row.get(0)?,
    name:       row.get(1)?,
    created_at: row.get(2)?,
    mode:       row.get(3)?,
  })
}

enum DeviceUpdate {
  Missing,
  Duplicate,
  Updated { created_at: String },
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Presensi store backed by a single SQLite file.
///
/// Cloning shares the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_presence(&self, id: Uuid) -> Result<Option<Presence>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPresence> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM presences p
           JOIN subjects s ON s.subject_id = p.subject_id
           WHERE p.presence_id = ?1",
          RawPresence::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawPresence::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPresence::into_presence).transpose()
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = crate::Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, name: String) -> Result<Subject> {
    let subject = Subject {
      subject_id: Uuid::new_v4(),
      name,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(subject.subject_id);
    let name   = subject.name.clone();
    let at_str = encode_dt(subject.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (subject_id, name, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(subject)
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT subject_id, name, created_at FROM subjects WHERE subject_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawSubject {
                  subject_id: row.get(0)?,
                  name:       row.get(1)?,
                  created_at: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT subject_id, name, created_at FROM subjects ORDER BY name")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawSubject {
              subject_id: row.get(0)?,
              name:       row.get(1)?,
              created_at: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  // ── Device registry ───────────────────────────────────────────────────────

  async fn create_device(&self, input: NewDevice) -> Result<Unique<Device>> {
    let device = Device {
      device_id:  Uuid::new_v4(),
      name:       input.name,
      modes:      input.modes,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(device.device_id);
    let name   = device.name.clone();
    let at_str = encode_dt(device.created_at);
    let modes: Vec<String> = device.modes.iter().map(ToString::to_string).collect();

    let stored: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        match tx.execute(
          "INSERT INTO devices (device_id, name, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, at_str],
        ) {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Ok(false),
          Err(e) => return Err(e.into()),
        }
        insert_modes(&tx, &id_str, &modes)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(if stored { Unique::Stored(device) } else { Unique::Duplicate })
  }

  async fn update_device(
    &self,
    id:    Uuid,
    input: NewDevice,
  ) -> Result<Option<Unique<Device>>> {
    let id_str = encode_uuid(id);
    let name   = input.name.clone();
    let modes: Vec<String> = input.modes.iter().map(ToString::to_string).collect();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let created_at: Option<String> = tx
          .query_row(
            "SELECT created_at FROM devices WHERE device_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(created_at) = created_at else {
          return Ok(DeviceUpdate::Missing);
        };

        match tx.execute(
          "UPDATE devices SET name = ?2 WHERE device_id = ?1",
          rusqlite::params![id_str, name],
        ) {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Ok(DeviceUpdate::Duplicate),
          Err(e) => return Err(e.into()),
        }
        tx.execute(
          "DELETE FROM device_modes WHERE device_id = ?1",
          rusqlite::params![id_str],
        )?;
        insert_modes(&tx, &id_str, &modes)?;
        tx.commit()?;
        Ok(DeviceUpdate::Updated { created_at })
      })
      .await?;

    Ok(match outcome {
      DeviceUpdate::Missing => None,
      DeviceUpdate::Duplicate => Some(Unique::Duplicate),
      DeviceUpdate::Updated { created_at } => Some(Unique::Stored(Device {
        device_id:  id,
        name:       input.name,
        modes:      input.modes,
        created_at: decode_dt(&created_at)?,
      })),
    })
  }

  async fn delete_device(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM devices WHERE device_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(removed > 0)
  }

  async fn get_device(&self, id: Uuid) -> Result<Option<Device>> {
    let id_str = encode_uuid(id);

    let raws: Vec<RawDeviceMode> = self
      .conn
      .call(move |conn| {
        let sql = format!("{DEVICE_SELECT} WHERE d.device_id = ?1 ORDER BY m.position");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], device_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(fold_devices(raws)?.into_iter().next())
  }

  async fn list_devices_with_modes(&self) -> Result<Vec<Device>> {
    let raws: Vec<RawDeviceMode> = self
      .conn
      .call(|conn| {
        let sql = format!("{DEVICE_SELECT} ORDER BY d.name, d.device_id, m.position");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], device_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    fold_devices(raws)
  }

  // ── Schedules ─────────────────────────────────────────────────────────────

  async fn create_schedule(&self, input: NewSchedule) -> Result<Schedule> {
    input.validate()?;

    let schedule = Schedule {
      schedule_id:    Uuid::new_v4(),
      name:           input.name,
      start_presence: input.start_presence,
      start_time:     input.start_time,
      finish_time:    input.finish_time,
      created_at:     Utc::now(),
    };

    let id_str     = encode_uuid(schedule.schedule_id);
    let name       = schedule.name.clone();
    let presence   = encode_time(schedule.start_presence);
    let start      = encode_time(schedule.start_time);
    let finish     = encode_time(schedule.finish_time);
    let at_str     = encode_dt(schedule.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO schedules (
             schedule_id, name, start_presence, start_time, finish_time, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, name, presence, start, finish, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(schedule)
  }

  async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSchedule> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM schedules WHERE schedule_id = ?1",
          RawSchedule::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawSchedule::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSchedule::into_schedule).transpose()
  }

  async fn list_schedules(&self) -> Result<Vec<Schedule>> {
    let raws: Vec<RawSchedule> = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM schedules ORDER BY start_presence, name",
          RawSchedule::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawSchedule::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSchedule::into_schedule).collect()
  }

  async fn get_active_schedule(&self, now: NaiveDateTime) -> Result<Option<Schedule>> {
    let t = encode_time(now.time());

    let raw: Option<RawSchedule> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM schedules
           WHERE start_presence <= ?1 AND finish_time >= ?1
           ORDER BY start_presence, name
           LIMIT 1",
          RawSchedule::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![t], RawSchedule::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSchedule::into_schedule).transpose()
  }

  // ── Cards ─────────────────────────────────────────────────────────────────

  async fn get_card_by_uid(&self, uid: &str) -> Result<Option<Card>> {
    let uid = uid.to_owned();

    let raw: Option<RawCard> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM cards WHERE uid = ?1", RawCard::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![uid], RawCard::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCard::into_card).transpose()
  }

  async fn create_card(&self, uid: String) -> Result<Unique<Card>> {
    let card = Card {
      uid,
      subject_id: None,
      is_active:  false,
      created_at: Utc::now(),
    };

    let uid    = card.uid.clone();
    let at_str = encode_dt(card.created_at);

    let stored: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO cards (uid, subject_id, is_active, created_at)
           VALUES (?1, NULL, 0, ?2)",
          rusqlite::params![uid, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    Ok(if stored { Unique::Stored(card) } else { Unique::Duplicate })
  }

  async fn update_card(&self, uid: String, update: CardUpdate) -> Result<Option<Card>> {
    let subject_str = update.subject_id.map(encode_uuid);

    let raw: Option<RawCard> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE cards
           SET subject_id = COALESCE(?2, subject_id),
               is_active  = COALESCE(?3, is_active)
           WHERE uid = ?1",
          rusqlite::params![uid, subject_str, update.is_active],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let sql = format!("SELECT {} FROM cards WHERE uid = ?1", RawCard::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![uid], RawCard::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCard::into_card).transpose()
  }

  async fn list_cards(&self) -> Result<Vec<Card>> {
    let raws: Vec<RawCard> = self
      .conn
      .call(|conn| {
        let sql = format!("SELECT {} FROM cards ORDER BY uid", RawCard::COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawCard::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCard::into_card).collect()
  }

  // ── Presences ─────────────────────────────────────────────────────────────

  async fn create_presence(&self, input: NewPresence) -> Result<Unique<Presence>> {
    let presence_id = Uuid::new_v4();

    let id_str       = encode_uuid(presence_id);
    let subject_str  = encode_uuid(input.subject_id);
    let schedule_str = encode_uuid(input.schedule_id);
    let status       = input.status.to_string();
    let created_by   = input.created_by.to_string();
    let date_str     = encode_date(input.presence_date);
    let at_str       = encode_dt(Utc::now());

    let stored: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO presences (
             presence_id, subject_id, schedule_id, schedule_name, status,
             note, created_by, presence_date, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            subject_str,
            schedule_str,
            input.schedule_name,
            status,
            input.note,
            created_by,
            date_str,
            at_str,
          ],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !stored {
      return Ok(Unique::Duplicate);
    }

    let presence = self
      .get_presence(presence_id)
      .await?
      .ok_or(crate::Error::RowVanished(presence_id))?;
    Ok(Unique::Stored(presence))
  }

  async fn bulk_create_presences(&self, inputs: Vec<NewPresence>) -> Result<u64> {
    if inputs.is_empty() {
      return Ok(0);
    }

    let at_str = encode_dt(Utc::now());
    let rows: Vec<[String; 5]> = inputs
      .iter()
      .map(|p| {
        [
          encode_uuid(Uuid::new_v4()),
          encode_uuid(p.subject_id),
          encode_uuid(p.schedule_id),
          p.status.to_string(),
          encode_date(p.presence_date),
        ]
      })
      .collect();
    let extras: Vec<(String, Option<String>, String)> = inputs
      .into_iter()
      .map(|p| (p.schedule_name, p.note, p.created_by.to_string()))
      .collect();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut total = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO presences (
               presence_id, subject_id, schedule_id, schedule_name, status,
               note, created_by, presence_date, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          )?;
          for ([id, subject, schedule, status, date], (name, note, by)) in
            rows.iter().zip(extras.iter())
          {
            total += stmt.execute(rusqlite::params![
              id, subject, schedule, name, status, note, by, date, at_str,
            ])? as u64;
          }
        }
        tx.commit()?;
        Ok(total)
      })
      .await?;

    Ok(inserted)
  }

  async fn list_subjects_missing_presence(
    &self,
    schedule_id: Uuid,
    date:        NaiveDate,
  ) -> Result<Vec<SubjectRef>> {
    let schedule_str = encode_uuid(schedule_id);
    let date_str     = encode_date(date);

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT s.subject_id, s.name, s.created_at
           FROM subjects s
           WHERE NOT EXISTS (
             SELECT 1 FROM presences p
             WHERE p.subject_id    = s.subject_id
               AND p.schedule_id   = ?1
               AND p.presence_date = ?2
           )
           ORDER BY s.name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![schedule_str, date_str], |row| {
            Ok(RawSubject {
              subject_id: row.get(0)?,
              name:       row.get(1)?,
              created_at: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_ref).collect()
  }

  async fn list_presences(
    &self,
    date:        NaiveDate,
    schedule_id: Option<Uuid>,
  ) -> Result<Vec<Presence>> {
    let date_str     = encode_date(date);
    let schedule_str = schedule_id.map(encode_uuid);

    let raws: Vec<RawPresence> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM presences p
           JOIN subjects s ON s.subject_id = p.subject_id
           WHERE p.presence_date = ?1
             AND (?2 IS NULL OR p.schedule_id = ?2)
           ORDER BY p.schedule_name, s.name",
          RawPresence::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![date_str, schedule_str], RawPresence::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPresence::into_presence).collect()
  }
}
