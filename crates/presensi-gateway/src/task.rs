//! Background tasks with an explicit stop signal.

use std::future::Future;

use tokio::{sync::oneshot, task::JoinHandle};

/// Owns a spawned task and the sender half of its stop signal.
pub struct TaskHandle {
  name: &'static str,
  stop: oneshot::Sender<()>,
  join: JoinHandle<()>,
}

impl TaskHandle {
  /// Spawn `body`, handing it the receiver it must watch to exit.
  pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
  where
    F: FnOnce(oneshot::Receiver<()>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let (stop, stop_rx) = oneshot::channel();
    let join = tokio::spawn(body(stop_rx));
    tracing::debug!(task = name, "background task started");
    Self { name, stop, join }
  }

  /// Signal the task and wait for it to finish.
  pub async fn shutdown(self) {
    // The task may already have exited on its own; that is fine.
    let _ = self.stop.send(());
    if let Err(e) = self.join.await {
      tracing::error!(task = self.name, error = %e, "background task panicked");
    } else {
      tracing::debug!(task = self.name, "background task stopped");
    }
  }
}
