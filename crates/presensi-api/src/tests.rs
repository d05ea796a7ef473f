//! Router tests against an in-memory SQLite store.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use presensi_core::store::AttendanceStore as _;
use presensi_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{DeviceWatcher, api_router};

#[derive(Default)]
struct CountingWatcher {
  calls: AtomicUsize,
}

impl DeviceWatcher for CountingWatcher {
  async fn devices_changed(&self) { self.calls.fetch_add(1, Ordering::SeqCst); }
}

struct Harness {
  store:   Arc<SqliteStore>,
  watcher: Arc<CountingWatcher>,
}

impl Harness {
  async fn new() -> Self {
    Self {
      store:   Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      watcher: Arc::new(CountingWatcher::default()),
    }
  }

  async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    let req = builder
      .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
      .unwrap();
    let resp = api_router(self.store.clone(), self.watcher.clone())
      .oneshot(req)
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    // Extractor rejections answer in plain text.
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
  }

  fn refreshes(&self) -> usize { self.watcher.calls.load(Ordering::SeqCst) }
}

// ── Devices ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_device_mutation_notifies_watcher() {
  let h = Harness::new().await;

  let (status, created) = h
    .send("POST", "/devices", Some(json!({ "name": "D1", "modes": ["presence"] })))
    .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(h.refreshes(), 1);

  let id = created["device_id"].as_str().unwrap().to_owned();
  let (status, updated) = h
    .send(
      "PUT",
      &format!("/devices/{id}"),
      Some(json!({ "name": "D1", "modes": ["presence", "record"] })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["modes"], json!(["presence", "record"]));
  assert_eq!(h.refreshes(), 2);

  let (status, _) = h.send("DELETE", &format!("/devices/{id}"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  assert_eq!(h.refreshes(), 3);
}

#[tokio::test]
async fn rejected_device_mutations_do_not_notify() {
  let h = Harness::new().await;
  h.send("POST", "/devices", Some(json!({ "name": "D1", "modes": [] })))
    .await;

  let (status, _) = h
    .send("POST", "/devices", Some(json!({ "name": "D1", "modes": [] })))
    .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = h
    .send("POST", "/devices", Some(json!({ "name": "a/b", "modes": [] })))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let missing = uuid::Uuid::new_v4();
  let (status, _) = h.send("DELETE", &format!("/devices/{missing}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  assert_eq!(h.refreshes(), 1);
}

// ── Schedules ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn schedule_window_is_validated() {
  let h = Harness::new().await;

  let (status, body) = h
    .send(
      "POST",
      "/schedules",
      Some(json!({
        "name": "Morning",
        "start_presence": "07:30:00",
        "start_time": "07:00:00",
        "finish_time": "15:00:00",
      })),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("window"));

  let (status, created) = h
    .send(
      "POST",
      "/schedules",
      Some(json!({
        "name": "Morning",
        "start_presence": "07:00:00",
        "start_time": "07:30:00",
        "finish_time": "15:00:00",
      })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED);

  let id = created["schedule_id"].as_str().unwrap();
  let (status, fetched) = h.send("GET", &format!("/schedules/{id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(fetched["start_time"], "07:30:00");
}

// ── Cards ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn patch_card_assigns_owner() {
  let h = Harness::new().await;
  h.store.create_card("ABC123".into()).await.unwrap();

  let (_, subject) = h.send("POST", "/subjects", Some(json!({ "name": "Siti" }))).await;
  let subject_id = subject["subject_id"].clone();

  let (status, card) = h
    .send(
      "PATCH",
      "/cards/ABC123",
      Some(json!({ "subject_id": subject_id, "is_active": true })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(card["subject_id"], subject_id);
  assert_eq!(card["is_active"], true);

  let (status, _) = h
    .send("PATCH", "/cards/ABC123", Some(json!({ "subject_id": uuid::Uuid::new_v4() })))
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = h.send("PATCH", "/cards/NOPE", Some(json!({ "is_active": true }))).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn presences_require_a_date() {
  let h = Harness::new().await;
  let (status, _) = h.send("GET", "/presences", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = h.send("GET", "/presences?date=2026-10-19", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));
}
