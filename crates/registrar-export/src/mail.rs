//! A mailer that writes outbound messages to the log.

use async_trait::async_trait;
use registrar_core::collaborators::Mailer;

use crate::{Error, Result};

/// Logs every message at `info` instead of delivering it. Rejects addresses
/// that could not be delivered anyway.
#[derive(Debug, Clone)]
pub struct LogMailer {
  from: String,
}

impl LogMailer {
  pub fn new(from: impl Into<String>) -> Self { Self { from: from.into() } }
}

fn check_address(to: &str) -> Result<()> {
  let reject = |reason: &str| Err(Error::Mail { to: to.to_owned(), reason: reason.to_owned() });
  let Some((local, domain)) = to.split_once('@') else {
    return reject("missing '@'");
  };
  if local.is_empty() || domain.is_empty() || domain.contains('@') {
    return reject("malformed address");
  }
  if to.chars().any(|c| c.is_whitespace() || c.is_control()) {
    return reject("address contains whitespace");
  }
  Ok(())
}

#[async_trait]
impl Mailer for LogMailer {
  async fn send(&self, to: &str, subject: &str, body: &str) -> registrar_core::Result<()> {
    check_address(to)?;
    tracing::info!(from = %self.from, to, subject, body_len = body.len(), "mail sent");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn valid_addresses_are_accepted() {
    let mailer = LogMailer::new("registrar@school.example");
    mailer.send("parent@example.org", "Export", "done").await.unwrap();
  }

  #[tokio::test]
  async fn invalid_addresses_fail_to_send() {
    let mailer = LogMailer::new("registrar@school.example");
    for to in ["nobody", "@example.org", "a@", "a@b@c", "a b@example.org"] {
      let err = mailer.send(to, "Export", "done").await.unwrap_err();
      match err {
        registrar_core::Error::EmailFailedToSend { to: got, .. } => assert_eq!(got, to),
        other => panic!("unexpected {other:?}"),
      }
    }
  }
}
