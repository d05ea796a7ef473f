//! SQL schema for the Presensi SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Times of day are stored as `HH:MM:SS` and calendar days as `YYYY-MM-DD`,
/// so plain string comparison orders them correctly.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS devices (
    device_id   TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS device_modes (
    device_id   TEXT NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
    mode        TEXT NOT NULL,   -- 'record' | 'presence' | 'permission' | 'ping'
    position    INTEGER NOT NULL,
    PRIMARY KEY (device_id, mode)
);

CREATE TABLE IF NOT EXISTS schedules (
    schedule_id     TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    start_presence  TEXT NOT NULL,
    start_time      TEXT NOT NULL,
    finish_time     TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    CHECK (start_presence < start_time AND start_time < finish_time)
);

CREATE TABLE IF NOT EXISTS cards (
    uid         TEXT PRIMARY KEY,
    subject_id  TEXT REFERENCES subjects(subject_id),
    is_active   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

-- Written by taps and by the absence backfill; never deleted.
CREATE TABLE IF NOT EXISTS presences (
    presence_id    TEXT PRIMARY KEY,
    subject_id     TEXT NOT NULL REFERENCES subjects(subject_id),
    schedule_id    TEXT NOT NULL REFERENCES schedules(schedule_id),
    schedule_name  TEXT NOT NULL,
    status         TEXT NOT NULL,   -- 'present' | 'late' | 'alpha' | 'sick' | 'permitted'
    note           TEXT,
    created_by     TEXT NOT NULL,   -- 'tap' | 'admin' | 'system'
    presence_date  TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    UNIQUE (subject_id, schedule_id, presence_date)
);

CREATE INDEX IF NOT EXISTS presences_day_idx   ON presences(schedule_id, presence_date);
CREATE INDEX IF NOT EXISTS cards_subject_idx   ON cards(subject_id);
CREATE INDEX IF NOT EXISTS schedules_window_idx ON schedules(start_presence, finish_time);

PRAGMA user_version = 1;
";
