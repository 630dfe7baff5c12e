//! HTTP Basic-auth extractor.
//!
//! The username is a staff email; the password is checked against the
//! argon2 PHC string stored for that staff member. Archived staff cannot
//! authenticate. A request with no `Authorization` header carries no
//! principal at all and fails with [`Error::AuthorityMissing`].

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;
use registrar_core::{AccessLevel, Error, Principal, repository::CredentialStore};

use crate::{AppState, Backend, error::ApiError};

/// The authenticated staff member behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
  pub principal: Principal,
  pub access:    AccessLevel,
}

impl Actor {
  /// The acting principal, provided its access level is at least `level`.
  pub fn require(&self, level: AccessLevel) -> Result<Principal, ApiError> {
    self.access.ensure(level)?;
    Ok(self.principal)
  }
}

fn unauthenticated(reason: &str) -> ApiError { ApiError(Error::Unauthenticated(reason.to_owned())) }

/// Pull `(username, password)` out of an `Authorization: Basic` header.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError(Error::AuthorityMissing))?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or_else(|| unauthenticated("unsupported scheme"))?;

  let decoded = B64.decode(encoded.trim()).map_err(|_| unauthenticated("malformed credentials"))?;
  let creds = String::from_utf8(decoded).map_err(|_| unauthenticated("malformed credentials"))?;

  let (username, password) =
    creds.split_once(':').ok_or_else(|| unauthenticated("malformed credentials"))?;
  Ok((username.to_owned(), password.to_owned()))
}

/// Authenticate the request against `store`.
pub async fn authenticate<S: CredentialStore>(
  headers: &HeaderMap,
  store: &S,
) -> Result<Actor, ApiError> {
  let (email, password) = basic_credentials(headers)?;
  let login = store
    .find_login(email.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| unauthenticated("unknown user"))?;

  if login.is_archived {
    tracing::warn!(%email, "archived staff member tried to authenticate");
    return Err(unauthenticated("credentials revoked"));
  }

  let parsed_hash =
    PasswordHash::new(&login.password_hash).map_err(|_| unauthenticated("unusable password hash"))?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| unauthenticated("wrong password"))?;

  Ok(Actor { principal: login.principal, access: login.access_level })
}

/// Produce an argon2 PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError(Error::Storage(format!("argon2 error: {e}"))))
}

impl<S: Backend> FromRequestParts<AppState<S>> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    authenticate(&parts.headers, state.store.as_ref()).await
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  #[test]
  fn parses_basic_credentials() {
    let encoded = B64.encode("ada@school.example:pa:ss");
    let (user, pass) = basic_credentials(&headers(&format!("Basic {encoded}"))).unwrap();
    assert_eq!(user, "ada@school.example");
    assert_eq!(pass, "pa:ss");
  }

  #[test]
  fn rejects_malformed_headers() {
    assert!(basic_credentials(&HeaderMap::new()).is_err());
    assert!(basic_credentials(&headers("Bearer abc")).is_err());
    assert!(basic_credentials(&headers("Basic !!!not-base64!!!")).is_err());
    let no_colon = B64.encode("nobody");
    let err = basic_credentials(&headers(&format!("Basic {no_colon}"))).unwrap_err();
    assert!(matches!(err.0, Error::Unauthenticated(_)));
  }

  #[test]
  fn absent_header_means_no_principal() {
    let err = basic_credentials(&HeaderMap::new()).unwrap_err();
    assert!(matches!(err.0, Error::AuthorityMissing));
    assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
  }

  #[test]
  fn hashes_verify() {
    let hash = hash_password("correct horse").unwrap();
    let parsed = PasswordHash::new(&hash).unwrap();
    assert!(Argon2::default().verify_password(b"correct horse", &parsed).is_ok());
    assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
  }

  #[test]
  fn access_levels_gate_principals() {
    let actor = Actor { principal: Principal::SYSTEM, access: AccessLevel::Editor };
    assert_eq!(actor.require(AccessLevel::Viewer).unwrap(), Principal::SYSTEM);
    let err = actor.require(AccessLevel::Admin).unwrap_err();
    assert!(matches!(err.0, Error::Forbidden { .. }));
  }
}
