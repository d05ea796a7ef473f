//! presensi-gateway server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) plus
//! `PRESENSI_*` environment overrides, opens the SQLite store, connects to
//! the MQTT broker and serves the admin API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash` in config.toml:
//!
//! ```text
//! cargo run -p presensi-gateway --bin server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use presensi_gateway::{
  Gateway, GatewayConfig,
  broker::mqtt::MqttBroker,
  clock::SystemClock,
};
use presensi_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Presensi attendance gateway")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = rpassword_or_stdin()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PRESENSI").separator("__"))
    .build()
    .context("failed to read config file")?;

  let cfg: GatewayConfig = settings
    .try_deserialize()
    .context("failed to deserialise GatewayConfig")?;

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let (broker, event_loop) = MqttBroker::connect(&cfg.mqtt);
  let broker = Arc::new(broker);

  let gateway = Gateway::new(
    store,
    broker.clone(),
    Arc::new(SystemClock),
    cfg.timeouts(),
    cfg.absence_note.clone(),
  );

  let mut tasks = vec![event_loop.spawn(gateway.dispatcher.clone())];
  gateway.start().await.context("failed to start gateway")?;
  tasks.extend(gateway.spawn_background(
    Duration::from_secs(cfg.schedule_refresh_secs),
    Duration::from_secs(cfg.backfill_check_secs),
  ));

  let app = gateway.router(Arc::new(cfg.auth()));
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!(mqtt = %format!("{}:{}", cfg.mqtt.host, cfg.mqtt.port), "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  tracing::info!("shutting down");
  for task in tasks {
    task.shutdown().await;
  }
  if let Err(e) = broker.disconnect().await {
    tracing::warn!(error = %e, "mqtt disconnect failed");
  }

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
  }
}

/// Read a password line from stdin.
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
