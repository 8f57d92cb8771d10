//! locum-api server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), wires the
//! storage adapter and the submission lifecycle manager, and serves the REST
//! API over HTTP. The dev build runs against the in-memory bucket stand-in
//! and the sandbox e-signature provider; a production deployment substitutes
//! real `ObjectBackend` / `SignatureProvider` implementations at this
//! composition point.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash` in config.toml:
//!
//! ```
//! cargo run -p locum-api --bin server -- --hash-password
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use locum_api::{AppState, ServerConfig, auth::AuthConfig};
use locum_esign::{DeliveryTiming, LifecycleManager, SandboxProvider};
use locum_storage::{MemoryBackend, StorageAdapter};

#[derive(Parser)]
#[command(author, version, about = "Locum document & e-signature API server")]
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
  // Initialise tracing.
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
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("LOCUM").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Storage: in-memory bucket when one is configured, local-only otherwise.
  let remote = server_cfg.storage.bucket.as_ref().map(|bucket| {
    MemoryBackend::new(
      bucket.clone(),
      server_cfg
        .storage
        .region
        .clone()
        .unwrap_or_else(|| "us-east-1".to_string()),
      server_cfg
        .url_signing_secret
        .clone()
        .unwrap_or_else(|| server_cfg.webhook_secret.clone()),
    )
  });
  let storage = StorageAdapter::new(server_cfg.storage.clone(), remote)
    .context("failed to initialise storage adapter")?;

  let report = storage.check_access().await;
  if report.has_access {
    tracing::info!("remote storage reachable");
  } else if let Some(error) = &report.error {
    tracing::warn!(error, "remote storage unavailable; relying on fallback");
  }

  // E-signature lifecycle manager over the sandbox provider.
  let esign =
    LifecycleManager::new(SandboxProvider::new(), DeliveryTiming::default());
  esign
    .initialize()
    .await
    .context("e-signature provider connection failed")?;
  let synced = esign
    .sync_templates()
    .await
    .context("initial template sync failed")?;
  tracing::info!(synced, "templates synced");

  // Build application state.
  let state = AppState {
    storage:        Arc::new(storage),
    esign,
    auth:           Arc::new(AuthConfig {
      username:      server_cfg.auth_username.clone(),
      password_hash: server_cfg.auth_password_hash.clone(),
    }),
    webhook_secret: Arc::from(server_cfg.webhook_secret.as_str()),
  };

  let app = locum_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
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
