//! Read command output parsing.
//!
//! The read command's stdout is the resource's observed state. It may be
//! interleaved with unrelated output, in which case a line prefix selects the
//! lines that carry the payload, and it may be base64 encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::config::{Config, ReadFormat};
use crate::state::ResourceState;

/// Read output could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
  #[error("read output is not valid base64: {0}")]
  Base64(#[from] base64::DecodeError),

  #[error("decoded read output is not valid UTF-8: {0}")]
  Utf8(#[from] std::string::FromUtf8Error),
}

/// Turns read command stdout into a [`ResourceState`].
#[derive(Debug, Clone)]
pub struct ReadParser {
  format: ReadFormat,
  line_prefix: Option<String>,
}

impl ReadParser {
  pub fn new(format: ReadFormat, line_prefix: Option<String>) -> Self {
    Self { format, line_prefix }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.read_format, config.read_line_prefix.clone())
  }

  /// Parse captured stdout.
  ///
  /// The result is `Present` iff the filtered, decoded payload is non-empty.
  pub fn parse(&self, stdout: &[u8]) -> Result<ResourceState, DecodeError> {
    let text = String::from_utf8_lossy(stdout);

    let filtered = match &self.line_prefix {
      Some(prefix) => filter_lines(&text, prefix),
      None => text.into_owned(),
    };

    if filtered.is_empty() {
      return Ok(ResourceState::Absent);
    }

    let payload = match self.format {
      ReadFormat::Raw => filtered,
      ReadFormat::Base64 => decode_base64(&filtered)?,
    };

    if payload.is_empty() {
      Ok(ResourceState::Absent)
    } else {
      Ok(ResourceState::Present(payload))
    }
  }
}

/// Keep lines starting with `prefix`, with the prefix removed.
///
/// Line terminators of kept lines are preserved.
fn filter_lines(text: &str, prefix: &str) -> String {
  text
    .split_inclusive('\n')
    .filter_map(|line| line.strip_prefix(prefix))
    .collect()
}

/// Decode standard base64, ignoring line breaks.
fn decode_base64(text: &str) -> Result<String, DecodeError> {
  let compact: String = text.chars().filter(|c| *c != '\n' && *c != '\r').collect();
  let bytes = STANDARD.decode(compact.as_bytes())?;
  Ok(String::from_utf8(bytes)?)
}
