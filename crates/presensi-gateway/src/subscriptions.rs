//! Topic Subscription Manager.
//!
//! Owns the set of input topics the gateway is subscribed to and keeps it
//! equal to what the device registry asks for. The set is recomputed from the
//! registry on every [`refresh`](TopicSubscriptionManager::refresh), never
//! patched incrementally.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use presensi_api::DeviceWatcher;
use presensi_core::{Result, store::AttendanceStore};
use tokio::sync::RwLock;

use crate::{broker::Broker, deadline::store_call};

/// What one reconciliation pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
  pub subscribed:   Vec<String>,
  pub unsubscribed: Vec<String>,
  /// Desired topics the broker refused; retried on the next refresh.
  pub failed:       Vec<String>,
}

impl RefreshReport {
  pub fn is_noop(&self) -> bool {
    self.subscribed.is_empty() && self.unsubscribed.is_empty() && self.failed.is_empty()
  }
}

pub struct TopicSubscriptionManager<S, B> {
  store:         Arc<S>,
  broker:        Arc<B>,
  live:          RwLock<BTreeSet<String>>,
  store_timeout: Duration,
}

impl<S, B> TopicSubscriptionManager<S, B>
where
  S: AttendanceStore,
  B: Broker,
{
  pub fn new(store: Arc<S>, broker: Arc<B>, store_timeout: Duration) -> Self {
    Self { store, broker, live: RwLock::new(BTreeSet::new()), store_timeout }
  }

  /// Reconcile live subscriptions with the device registry.
  ///
  /// The write lock is held from the registry read until the last broker
  /// call returns, so no reader sees a topic as live before the broker has
  /// accepted it. A registry read failure leaves the live set untouched.
  pub async fn refresh(&self) -> Result<RefreshReport> {
    let mut live = self.live.write().await;
    self.reconcile(&mut live).await
  }

  /// Subscribe every desired topic from scratch. Used after the broker
  /// connection is (re)established. The live set is only replaced once the
  /// registry has been read, under the same write guard.
  pub async fn resubscribe(&self) -> Result<RefreshReport> {
    let mut live = self.live.write().await;
    let mut fresh = BTreeSet::new();
    let report = self.reconcile(&mut fresh).await?;
    *live = fresh;
    Ok(report)
  }

  async fn reconcile(&self, live: &mut BTreeSet<String>) -> Result<RefreshReport> {
    let devices = store_call(
      self.store_timeout,
      "device registry read",
      self.store.list_devices_with_modes(),
    )
    .await?;
    let desired: BTreeSet<String> =
      devices.iter().flat_map(|d| d.input_topics()).collect();

    let mut report = RefreshReport::default();

    let stale: Vec<String> = live.difference(&desired).cloned().collect();
    for topic in stale {
      // Stop routing even if the broker call fails; a stray delivery is
      // dropped by the dispatcher as not live.
      live.remove(&topic);
      if let Err(e) = self.broker.unsubscribe(&topic).await {
        tracing::warn!(topic = %topic, error = %e, "unsubscribe failed");
      }
      report.unsubscribed.push(topic);
    }

    let missing: Vec<String> = desired.difference(live).cloned().collect();
    for topic in missing {
      match self.broker.subscribe(&topic).await {
        Ok(()) => {
          live.insert(topic.clone());
          report.subscribed.push(topic);
        }
        Err(e) => {
          tracing::warn!(topic = %topic, error = %e, "subscribe failed; will retry on next refresh");
          report.failed.push(topic);
        }
      }
    }

    if !report.is_noop() {
      tracing::info!(
        subscribed = report.subscribed.len(),
        unsubscribed = report.unsubscribed.len(),
        failed = report.failed.len(),
        live = live.len(),
        "topic subscriptions refreshed"
      );
    }
    Ok(report)
  }

  pub async fn is_live(&self, topic: &str) -> bool { self.live.read().await.contains(topic) }

  /// Sorted snapshot of the live set.
  pub async fn live_topics(&self) -> Vec<String> {
    self.live.read().await.iter().cloned().collect()
  }
}

impl<S, B> DeviceWatcher for TopicSubscriptionManager<S, B>
where
  S: AttendanceStore + 'static,
  B: Broker,
{
  async fn devices_changed(&self) {
    if let Err(e) = self.refresh().await {
      tracing::error!(error = %e, "topic refresh after device change failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use presensi_core::device::{Mode, NewDevice};
  use presensi_store_sqlite::SqliteStore;

  use super::*;
  use crate::broker::memory::{BrokerCall, MemoryBroker};

  async fn setup() -> (
    Arc<SqliteStore>,
    Arc<MemoryBroker>,
    TopicSubscriptionManager<SqliteStore, MemoryBroker>,
  ) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let broker = Arc::new(MemoryBroker::new());
    let manager =
      TopicSubscriptionManager::new(store.clone(), broker.clone(), Duration::from_secs(5));
    (store, broker, manager)
  }

  async fn add_device(store: &SqliteStore, name: &str, modes: Vec<Mode>) -> uuid::Uuid {
    store
      .create_device(NewDevice { name: name.into(), modes })
      .await
      .unwrap()
      .stored()
      .unwrap()
      .device_id
  }

  #[tokio::test]
  async fn refresh_subscribes_every_device_mode() {
    let (store, broker, manager) = setup().await;
    add_device(&store, "D1", vec![Mode::Presence, Mode::Record]).await;
    add_device(&store, "D2", vec![Mode::Ping]).await;

    let report = manager.refresh().await.unwrap();
    assert_eq!(report.subscribed.len(), 3);
    assert_eq!(manager.live_topics().await, vec![
      "D1/input/presence".to_owned(),
      "D1/input/record".to_owned(),
      "D2/input/ping".to_owned(),
    ]);
    assert_eq!(broker.subscribed().len(), 3);
  }

  #[tokio::test]
  async fn second_refresh_without_changes_is_a_noop() {
    let (store, broker, manager) = setup().await;
    add_device(&store, "D1", vec![Mode::Presence]).await;
    manager.refresh().await.unwrap();
    broker.clear_calls();

    let report = manager.refresh().await.unwrap();
    assert!(report.is_noop());
    assert!(broker.calls().is_empty());
  }

  #[tokio::test]
  async fn removed_modes_and_devices_are_unsubscribed() {
    let (store, broker, manager) = setup().await;
    let d1 = add_device(&store, "D1", vec![Mode::Presence, Mode::Record]).await;
    let d2 = add_device(&store, "D2", vec![Mode::Presence]).await;
    manager.refresh().await.unwrap();
    broker.clear_calls();

    store
      .update_device(d1, NewDevice { name: "D1".into(), modes: vec![Mode::Presence] })
      .await
      .unwrap();
    store.delete_device(d2).await.unwrap();
    let report = manager.refresh().await.unwrap();

    assert_eq!(report.unsubscribed, vec![
      "D1/input/record".to_owned(),
      "D2/input/presence".to_owned(),
    ]);
    assert!(report.subscribed.is_empty());
    assert_eq!(manager.live_topics().await, vec!["D1/input/presence".to_owned()]);
    assert!(broker.calls().iter().all(|c| matches!(c, BrokerCall::Unsubscribe(_))));
  }

  #[tokio::test]
  async fn renamed_device_moves_its_topics() {
    let (store, _broker, manager) = setup().await;
    let d1 = add_device(&store, "D1", vec![Mode::Presence]).await;
    manager.refresh().await.unwrap();

    store
      .update_device(d1, NewDevice { name: "lobby".into(), modes: vec![Mode::Presence] })
      .await
      .unwrap();
    manager.devices_changed().await;

    assert!(!manager.is_live("D1/input/presence").await);
    assert!(manager.is_live("lobby/input/presence").await);
  }

  #[tokio::test]
  async fn failed_subscription_does_not_block_others_and_is_retried() {
    let (store, broker, manager) = setup().await;
    add_device(&store, "D1", vec![Mode::Presence, Mode::Record]).await;
    broker.fail_subscriptions_to("D1/input/record");

    let report = manager.refresh().await.unwrap();
    assert_eq!(report.subscribed, vec!["D1/input/presence".to_owned()]);
    assert_eq!(report.failed, vec!["D1/input/record".to_owned()]);
    assert!(!manager.is_live("D1/input/record").await);

    broker.heal("D1/input/record");
    let retry = manager.refresh().await.unwrap();
    assert_eq!(retry.subscribed, vec!["D1/input/record".to_owned()]);
    assert!(manager.is_live("D1/input/record").await);
  }

  #[tokio::test]
  async fn resubscribe_replays_every_topic() {
    let (store, broker, manager) = setup().await;
    add_device(&store, "D1", vec![Mode::Presence]).await;
    manager.refresh().await.unwrap();
    broker.clear_calls();

    manager.resubscribe().await.unwrap();
    assert_eq!(broker.calls(), vec![BrokerCall::Subscribe("D1/input/presence".into())]);
  }

  #[tokio::test]
  async fn topics_stay_live_while_resubscribing() {
    let (store, broker, manager) = setup().await;
    add_device(&store, "D1", vec![Mode::Presence]).await;
    manager.refresh().await.unwrap();
    let manager = Arc::new(manager);

    let resubscribing = {
      let manager = manager.clone();
      tokio::spawn(async move { manager.resubscribe().await })
    };
    // Readers queue behind the writer and never observe an emptied set.
    for _ in 0..20 {
      assert!(manager.is_live("D1/input/presence").await);
      tokio::task::yield_now().await;
    }
    resubscribing.await.unwrap().unwrap();
    assert!(manager.is_live("D1/input/presence").await);
    assert!(broker.subscribed().contains("D1/input/presence"));
  }
}
