//! Field validators used by the entity factories.

use chrono::{NaiveDate, Utc};

use crate::{Error, Result};

/// Reject empty and whitespace-only strings.
pub fn not_blank(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::validation(field, "must not be blank"));
  }
  Ok(())
}

pub fn max_len(field: &str, value: &str, max: usize) -> Result<()> {
  if value.chars().count() > max {
    return Err(Error::validation(field, format!("must be at most {max} characters")));
  }
  Ok(())
}

/// `not_blank` + `max_len`.
pub fn required_text(field: &str, value: &str, max: usize) -> Result<()> {
  not_blank(field, value)?;
  max_len(field, value, max)
}

/// Optional text: blank is rejected only when a value is supplied.
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<()> {
  value.map_or(Ok(()), |v| required_text(field, v, max))
}

/// A deliberately small address check: one `@`, non-empty local part, and a
/// dotted domain without whitespace.
pub fn email(field: &str, value: &str) -> Result<()> {
  let invalid = || Error::validation(field, "must be a valid email address");
  let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
  if local.is_empty()
    || domain.contains('@')
    || !domain.contains('.')
    || domain.starts_with('.')
    || domain.ends_with('.')
    || value.chars().any(char::is_whitespace)
  {
    return Err(invalid());
  }
  max_len(field, value, 254)
}

/// Academic session in `YYYY/YYYY` form where the second year follows the
/// first, e.g. `2024/2025`.
pub fn session_year(field: &str, value: &str) -> Result<()> {
  let invalid = || Error::validation(field, "must look like 2024/2025");
  let (a, b) = value.split_once('/').ok_or_else(invalid)?;
  if a.len() != 4 || b.len() != 4 {
    return Err(invalid());
  }
  let start: u16 = a.parse().map_err(|_| invalid())?;
  let end: u16 = b.parse().map_err(|_| invalid())?;
  if end != start + 1 {
    return Err(invalid());
  }
  Ok(())
}

pub fn past_date(field: &str, value: NaiveDate) -> Result<()> {
  if value >= Utc::now().date_naive() {
    return Err(Error::validation(field, "must be in the past"));
  }
  Ok(())
}

pub fn not_future_date(field: &str, value: NaiveDate) -> Result<()> {
  if value > Utc::now().date_naive() {
    return Err(Error::validation(field, "must not be in the future"));
  }
  Ok(())
}

pub fn range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
  if !(min..=max).contains(&value) {
    return Err(Error::validation(field, format!("must be between {min} and {max}")));
  }
  Ok(())
}

/// Two references that must point at different rows.
pub fn distinct<T: PartialEq>(field: &str, from: Option<&T>, to: &T) -> Result<()> {
  if from == Some(to) {
    return Err(Error::validation(field, "must differ from the current value"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  #[test]
  fn blank_and_long_text() {
    assert!(not_blank("name", "  ").is_err());
    assert!(required_text("name", "Science", 10).is_ok());
    assert!(required_text("name", "Natural Sciences", 10).is_err());
    assert!(optional_text("description", None, 10).is_ok());
    assert!(optional_text("description", Some(""), 10).is_err());
  }

  #[test]
  fn email_shapes() {
    assert!(email("email", "ada@school.example").is_ok());
    for bad in ["ada", "@school.example", "ada@school", "ada@@x.y", "a da@x.y", "ada@.x"] {
      assert!(email("email", bad).is_err(), "{bad} accepted");
    }
  }

  #[test]
  fn session_year_format() {
    assert!(session_year("academic_session", "2024/2025").is_ok());
    assert!(session_year("academic_session", "2024/2026").is_err());
    assert!(session_year("academic_session", "2024-2025").is_err());
    assert!(session_year("academic_session", "24/25").is_err());
  }

  #[test]
  fn dates() {
    let today = Utc::now().date_naive();
    assert!(past_date("date_of_birth", today - Duration::days(1)).is_ok());
    assert!(past_date("date_of_birth", today).is_err());
    assert!(not_future_date("awarded_on", today).is_ok());
    assert!(not_future_date("awarded_on", today + Duration::days(2)).is_err());
  }

  #[test]
  fn score_range() {
    assert!(range("score", 100.0, 0.0, 100.0).is_ok());
    assert!(range("score", -0.5, 0.0, 100.0).is_err());
  }
}
