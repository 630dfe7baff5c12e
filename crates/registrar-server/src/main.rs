//! Registrar server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `REGISTRAR_*`
//! environment variables, opens the SQLite store, and serves the JSON API
//! under `/api` and presigned object downloads under `/objects`.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `bootstrap_admin_password_hash`:
//!
//! ```text
//! cargo run -p registrar-server -- --hash-password
//! ```

mod config;
mod download;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::Router;
use clap::Parser;
use rand_core::{OsRng, RngCore};
use registrar_api::AppState;
use registrar_export::{ArtifactRenderer, LocalObjectStore, LogMailer, MagicProbe};
use registrar_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Registrar school records server")]
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
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)?;

  if let Some(parent) = cfg.store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  if let Some((email, hash)) = cfg.bootstrap_admin() {
    let admin = store
      .bootstrap_admin(email.clone(), hash)
      .await
      .with_context(|| format!("failed to bootstrap admin {email}"))?;
    tracing::info!(%email, id = %admin, "bootstrap admin ready");
  }

  let signing_key = match &cfg.signing_key {
    Some(key) => key.clone(),
    None => {
      tracing::warn!("no signing_key configured; download links will not survive a restart");
      let mut key = [0u8; 32];
      OsRng.fill_bytes(&mut key);
      hex::encode(key)
    }
  };
  let objects = Arc::new(
    LocalObjectStore::new(&cfg.object_store_root, cfg.public_base_url.clone(), signing_key)
      .await
      .with_context(|| format!("failed to open object store at {:?}", cfg.object_store_root))?,
  );

  let state = AppState {
    store:       Arc::new(store),
    objects:     objects.clone(),
    renderer:    Arc::new(ArtifactRenderer),
    mailer:      Arc::new(LogMailer::new(cfg.mail_from.clone())),
    probe:       Arc::new(MagicProbe),
    presign_ttl: Duration::from_secs(cfg.presign_ttl_secs),
  };

  let app = Router::new()
    .nest("/api", registrar_api::api_router(state))
    .merge(download::router(objects))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", cfg.host, cfg.port);
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
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
