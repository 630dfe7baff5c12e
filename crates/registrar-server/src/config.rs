//! Runtime configuration.
//!
//! Read from an optional TOML file, then overlaid by `REGISTRAR_*`
//! environment variables (`REGISTRAR_PORT=9000`, `REGISTRAR_SIGNING_KEY=...`).

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                          String,
  #[serde(default = "default_port")]
  pub port:                          u16,
  #[serde(default = "default_store_path")]
  pub store_path:                    PathBuf,
  #[serde(default = "default_object_store_root")]
  pub object_store_root:             PathBuf,
  /// Prefix of presigned download URLs; must route to this server's
  /// `/objects` endpoint.
  #[serde(default = "default_public_base_url")]
  pub public_base_url:               String,
  /// Secret for download URL signatures. Generated per run when unset.
  pub signing_key:                   Option<String>,
  #[serde(default = "default_presign_ttl_secs")]
  pub presign_ttl_secs:              u64,
  #[serde(default = "default_mail_from")]
  pub mail_from:                     String,
  pub bootstrap_admin_email:         Option<String>,
  /// argon2 PHC string, see `--hash-password`.
  pub bootstrap_admin_password_hash: Option<String>,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/registrar/registrar.db") }

fn default_object_store_root() -> PathBuf { PathBuf::from("~/.local/share/registrar/objects") }

fn default_public_base_url() -> String { "http://127.0.0.1:8080/objects".into() }

fn default_presign_ttl_secs() -> u64 { 900 }

fn default_mail_from() -> String { "registrar@localhost".into() }

impl ServerConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("REGISTRAR"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: ServerConfig =
      settings.try_deserialize().context("failed to deserialise ServerConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.object_store_root = expand_tilde(&cfg.object_store_root);
    Ok(cfg)
  }

  /// The configured bootstrap admin, if both halves are set.
  pub fn bootstrap_admin(&self) -> Option<(String, String)> {
    match (&self.bootstrap_admin_email, &self.bootstrap_admin_password_hash) {
      (Some(email), Some(hash)) => Some((email.clone(), hash.clone())),
      (None, None) => None,
      _ => {
        tracing::warn!("bootstrap admin needs both an email and a password hash; skipping");
        None
      }
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
      file,
      "port = 9000\nstore_path = \"/srv/registrar.db\"\nbootstrap_admin_email = \"a@b.example\""
    )
    .unwrap();

    let cfg = ServerConfig::load(file.path()).unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.store_path, PathBuf::from("/srv/registrar.db"));
    assert_eq!(cfg.presign_ttl_secs, 900);
    assert!(cfg.signing_key.is_none());
    // Half a bootstrap admin is ignored.
    assert!(cfg.bootstrap_admin().is_none());
  }

  #[test]
  fn tilde_is_expanded() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
