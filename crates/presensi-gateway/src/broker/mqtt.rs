//! MQTT transport built on [`rumqttc`].
//!
//! [`MqttBroker::connect`] splits the connection into the cloneable client
//! (implementing [`Broker`]) and an [`MqttEventLoop`] that must be polled for
//! anything to move. The event loop hands every inbound publish to the
//! dispatcher on its own task and resubscribes after each broker ConnAck,
//! since a clean session starts with no subscriptions.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use presensi_core::store::AttendanceStore;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Deserialize;

use super::{Broker, BrokerError};
use crate::{dispatch::Dispatcher, task::TaskHandle};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// `[mqtt]` section of the gateway configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  #[serde(default = "default_client_id")]
  pub client_id:        String,
  #[serde(default = "default_keep_alive_secs")]
  pub keep_alive_secs:  u64,
  pub username:         Option<String>,
  pub password:         Option<String>,
  /// Capacity of the request channel between client and event loop.
  #[serde(default = "default_channel_capacity")]
  pub channel_capacity: usize,
}

fn default_host() -> String { "localhost".to_owned() }
fn default_port() -> u16 { 1883 }
fn default_client_id() -> String { "presensi-gateway".to_owned() }
fn default_keep_alive_secs() -> u64 { 30 }
fn default_channel_capacity() -> usize { 64 }

impl Default for MqttConfig {
  fn default() -> Self {
    Self {
      host:             default_host(),
      port:             default_port(),
      client_id:        default_client_id(),
      keep_alive_secs:  default_keep_alive_secs(),
      username:         None,
      password:         None,
      channel_capacity: default_channel_capacity(),
    }
  }
}

/// The client half of an MQTT connection.
#[derive(Clone)]
pub struct MqttBroker {
  client: AsyncClient,
}

impl MqttBroker {
  /// Build the client and its event loop. Nothing touches the network until
  /// the event loop is polled.
  pub fn connect(config: &MqttConfig) -> (Self, MqttEventLoop) {
    let mut options =
      MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    options.set_clean_session(true);
    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
      options.set_credentials(user.clone(), pass.clone());
    }

    let (client, event_loop) = AsyncClient::new(options, config.channel_capacity);
    (Self { client }, MqttEventLoop { inner: event_loop })
  }

  pub async fn disconnect(&self) -> Result<(), BrokerError> {
    self.client.disconnect().await?;
    Ok(())
  }
}

impl Broker for MqttBroker {
  async fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
    self.client.subscribe(topic, QoS::AtLeastOnce).await?;
    Ok(())
  }

  async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError> {
    self.client.unsubscribe(topic).await?;
    Ok(())
  }

  async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
    self
      .client
      .publish(topic, QoS::AtLeastOnce, false, payload)
      .await?;
    Ok(())
  }
}

/// The polling half of an MQTT connection.
pub struct MqttEventLoop {
  inner: EventLoop,
}

impl MqttEventLoop {
  /// Drive the connection until stopped, feeding inbound publishes to
  /// `dispatcher`.
  pub fn spawn<S>(self, dispatcher: Arc<Dispatcher<S, MqttBroker>>) -> TaskHandle
  where
    S: AttendanceStore + 'static,
  {
    let mut event_loop = self.inner;
    TaskHandle::spawn("mqtt event loop", move |mut stop| async move {
      loop {
        let event = tokio::select! {
          _ = &mut stop => break,
          event = event_loop.poll() => event,
        };

        match event {
          Ok(Event::Incoming(Packet::Publish(publish))) => {
            let dispatcher = dispatcher.clone();
            let topic = publish.topic;
            let payload: Bytes = publish.payload;
            tokio::spawn(async move {
              dispatcher.handle(&topic, &payload).await;
            });
          }
          Ok(Event::Incoming(Packet::ConnAck(ack))) => {
            tracing::info!(code = ?ack.code, "connected to mqtt broker");
            // Subscribing goes through the request channel this loop drains,
            // so it must not be awaited here.
            let subscriptions = dispatcher.subscriptions().clone();
            tokio::spawn(async move {
              if let Err(e) = subscriptions.resubscribe().await {
                tracing::error!(error = %e, "resubscribe after connect failed");
              }
            });
          }
          Ok(_) => {}
          Err(e) => {
            tracing::warn!(error = %e, "mqtt connection error; retrying");
            tokio::select! {
              _ = &mut stop => break,
              _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
          }
        }
      }
    })
  }
}
