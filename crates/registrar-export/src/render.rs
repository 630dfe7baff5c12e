//! JSON and XML artifact rendering.

use std::io::Cursor;

use bytes::Bytes;
use quick_xml::{
  Writer,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use registrar_core::collaborators::{ExportFormat, ExportRenderer, Rendered};
use serde_json::Value;

use crate::{Error, Result};

const ROOT: &str = "export";
const ITEM: &str = "item";

/// Renders gathered export data. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactRenderer;

impl ArtifactRenderer {
  pub fn to_json(data: &Value) -> Result<Vec<u8>> { Ok(serde_json::to_vec_pretty(data)?) }

  /// Objects become nested elements named after their keys, arrays become
  /// repeated `<item>` elements, and nulls become empty elements.
  pub fn to_xml(data: &Value) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
      .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
      .map_err(xml_err)?;
    write_value(&mut writer, ROOT, data)?;
    Ok(writer.into_inner().into_inner())
  }
}

impl ExportRenderer for ArtifactRenderer {
  fn render(
    &self,
    data: &Value,
    filename: &str,
    format: ExportFormat,
  ) -> registrar_core::Result<Rendered> {
    let bytes = match format {
      ExportFormat::Json => Self::to_json(data)?,
      ExportFormat::Xml => Self::to_xml(data)?,
    };
    tracing::debug!(filename, format = format.as_ref(), size = bytes.len(), "artifact rendered");
    Ok(Rendered {
      bytes:    Bytes::from(bytes),
      filename: format!("{filename}.{}", format.extension()),
    })
  }
}

fn xml_err(e: impl std::fmt::Display) -> Error { Error::Xml(e.to_string()) }

/// Make `key` usable as an element name.
fn element_name(key: &str) -> String {
  let mut name: String = key
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
    .collect();
  if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
    name.insert(0, '_');
  }
  name
}

fn write_value(w: &mut Writer<Cursor<Vec<u8>>>, tag: &str, value: &Value) -> Result<()> {
  match value {
    Value::Null => {
      w.write_event(Event::Empty(BytesStart::new(tag))).map_err(xml_err)?;
    }
    Value::Object(map) => {
      w.write_event(Event::Start(BytesStart::new(tag))).map_err(xml_err)?;
      for (key, child) in map {
        write_value(w, &element_name(key), child)?;
      }
      w.write_event(Event::End(BytesEnd::new(tag))).map_err(xml_err)?;
    }
    Value::Array(items) => {
      w.write_event(Event::Start(BytesStart::new(tag))).map_err(xml_err)?;
      for item in items {
        write_value(w, ITEM, item)?;
      }
      w.write_event(Event::End(BytesEnd::new(tag))).map_err(xml_err)?;
    }
    Value::String(s) => write_text(w, tag, s)?,
    other => write_text(w, tag, &other.to_string())?,
  }
  Ok(())
}

fn write_text(w: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> Result<()> {
  w.write_event(Event::Start(BytesStart::new(tag))).map_err(xml_err)?;
  w.write_event(Event::Text(BytesText::new(text))).map_err(xml_err)?;
  w.write_event(Event::End(BytesEnd::new(tag))).map_err(xml_err)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn sample() -> Value {
    json!({
      "entity": "Student",
      "record": { "id": "abc", "first_name": "Alan & co", "guardian_id": null, "active": true },
      "grades": [{ "score": 91.5 }, { "score": 40 }],
    })
  }

  #[test]
  fn json_artifact_round_trips() {
    let rendered = ArtifactRenderer.render(&sample(), "student-s-001", ExportFormat::Json).unwrap();
    assert_eq!(rendered.filename, "student-s-001.json");
    let back: Value = serde_json::from_slice(&rendered.bytes).unwrap();
    assert_eq!(back, sample());
  }

  #[test]
  fn xml_artifact_nests_and_escapes() {
    let rendered = ArtifactRenderer.render(&sample(), "student-s-001", ExportFormat::Xml).unwrap();
    assert_eq!(rendered.filename, "student-s-001.xml");
    let xml = String::from_utf8(rendered.bytes.to_vec()).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<entity>Student</entity>"));
    assert!(xml.contains("<first_name>Alan &amp; co</first_name>"));
    assert!(xml.contains("<guardian_id/>"));
    assert!(xml.contains("<active>true</active>"));
    assert_eq!(xml.matches("<item>").count(), 2);
    assert!(xml.contains("<score>91.5</score>"));
    assert!(xml.trim_end().ends_with("</export>"));
  }

  #[test]
  fn element_names_are_made_valid() {
    assert_eq!(element_name("first_name"), "first_name");
    assert_eq!(element_name("2fa code"), "_2fa_code");
  }
}
