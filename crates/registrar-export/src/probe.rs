//! Content-type sniffing from magic bytes.

use registrar_core::collaborators::{MimeProbe, PROBE_WINDOW};

const OCTET_STREAM: &str = "application/octet-stream";

/// Signatures checked in order; the first prefix match wins.
const MAGIC: &[(&[u8], &str)] = &[
  (b"%PDF-", "application/pdf"),
  (b"\x89PNG\r\n\x1a\n", "image/png"),
  (b"\xff\xd8\xff", "image/jpeg"),
  (b"GIF87a", "image/gif"),
  (b"GIF89a", "image/gif"),
  (b"PK\x03\x04", "application/zip"),
  (b"\x1f\x8b", "application/gzip"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct MagicProbe;

impl MimeProbe for MagicProbe {
  fn probe(&self, head: &[u8]) -> &'static str {
    let head = &head[..head.len().min(PROBE_WINDOW)];
    if let Some(&(_, mime)) = MAGIC.iter().find(|(magic, _)| head.starts_with(magic)) {
      return mime;
    }
    sniff_text(head).unwrap_or(OCTET_STREAM)
  }
}

fn sniff_text(head: &[u8]) -> Option<&'static str> {
  let head = head.strip_prefix(b"\xef\xbb\xbf").unwrap_or(head);
  if head.is_empty() || head.contains(&0) {
    return None;
  }
  // A multi-byte sequence may be cut at the window edge.
  let text = match std::str::from_utf8(head) {
    Ok(text) => text,
    Err(e) if e.error_len().is_none() => std::str::from_utf8(&head[..e.valid_up_to()]).ok()?,
    Err(_) => return None,
  };

  let trimmed = text.trim_start();
  Some(if trimmed.starts_with("<?xml") {
    "application/xml"
  } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
    "application/json"
  } else {
    "text/plain"
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn binary_signatures() {
    let p = MagicProbe;
    assert_eq!(p.probe(b"%PDF-1.7\n%\xe2\xe3"), "application/pdf");
    assert_eq!(p.probe(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), "image/png");
    assert_eq!(p.probe(b"\xff\xd8\xff\xe0\0\x10JFIF"), "image/jpeg");
    assert_eq!(p.probe(b"GIF89a\x01\0"), "image/gif");
    assert_eq!(p.probe(b"PK\x03\x04\x14\0"), "application/zip");
  }

  #[test]
  fn text_formats() {
    let p = MagicProbe;
    assert_eq!(p.probe(b"<?xml version=\"1.0\"?><a/>"), "application/xml");
    assert_eq!(p.probe(b"\xef\xbb\xbf  {\"a\": 1}"), "application/json");
    assert_eq!(p.probe("Zeugnis für Schüler".as_bytes()), "text/plain");
  }

  #[test]
  fn unknown_and_empty_fall_back() {
    let p = MagicProbe;
    assert_eq!(p.probe(b""), OCTET_STREAM);
    assert_eq!(p.probe(b"\0\x01\x02\x03"), OCTET_STREAM);
    assert_eq!(p.probe(b"\xc3\x28abc"), OCTET_STREAM);
  }

  #[test]
  fn truncated_utf8_at_window_edge_is_text() {
    let mut head = vec![b'a'; PROBE_WINDOW - 1];
    head.extend_from_slice("ü".as_bytes());
    assert_eq!(MagicProbe.probe(&head), "text/plain");
  }
}
