//! Output stream draining.
//!
//! Each child pipe is drained by its own task. Bytes are kept up to the
//! configured cap and every line is logged as it arrives. Draining never stops
//! at the cap, otherwise a chatty child would block on a full pipe.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::config::{CommandLog, LogLevel};
use crate::lifecycle::Operation;

const CHUNK_SIZE: usize = 8 * 1024;

/// Which child stream is being drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
  Stdout,
  Stderr,
}

impl fmt::Display for StreamKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StreamKind::Stdout => f.write_str("stdout"),
      StreamKind::Stderr => f.write_str("stderr"),
    }
  }
}

/// Bytes captured from one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedStream {
  /// At most `buffer_size` bytes, from the start of the stream.
  pub bytes: Vec<u8>,
  /// Output was cut off at the cap.
  pub truncated: bool,
  /// The last bytes of the stream, at most [`TAIL_SIZE`], starting on a line
  /// boundary when earlier output was dropped. Kept regardless of the cap.
  pub tail: Vec<u8>,
}

/// Bytes kept at the end of each stream for diagnostics.
pub const TAIL_SIZE: usize = 4 * 1024;

/// Bounded accumulator that also keeps a rolling tail.
#[derive(Debug)]
struct BoundedBuffer {
  limit: usize,
  bytes: Vec<u8>,
  truncated: bool,
  tail: Vec<u8>,
  tail_cut: bool,
}

impl BoundedBuffer {
  fn new(limit: usize) -> Self {
    Self {
      limit,
      bytes: Vec::new(),
      truncated: false,
      tail: Vec::new(),
      tail_cut: false,
    }
  }

  fn push(&mut self, chunk: &[u8]) {
    let room = self.limit.saturating_sub(self.bytes.len());
    if chunk.len() > room {
      self.truncated = true;
    }
    let take = chunk.len().min(room);
    self.bytes.extend_from_slice(&chunk[..take]);

    self.tail.extend_from_slice(chunk);
    if self.tail.len() > TAIL_SIZE {
      let excess = self.tail.len() - TAIL_SIZE;
      self.tail.drain(..excess);
      self.tail_cut = true;
    }
  }

  fn finish(mut self) -> CapturedStream {
    // Drop the partial line left at the front of a cut tail.
    if self.tail_cut {
      match self.tail.iter().position(|&b| b == b'\n') {
        Some(newline) if newline + 1 < self.tail.len() => {
          self.tail.drain(..=newline);
        }
        _ => {}
      }
    }

    CapturedStream {
      bytes: self.bytes,
      truncated: self.truncated,
      tail: self.tail,
    }
  }
}

/// Splits a byte stream into lines and logs each one.
pub(crate) struct LineLogger {
  provider: Arc<str>,
  operation: Operation,
  stream: StreamKind,
  level: LogLevel,
  width: usize,
  /// Lines longer than this are logged in pieces.
  max_line: usize,
  pending: Vec<u8>,
}

impl LineLogger {
  pub(crate) fn new(
    log: &CommandLog,
    provider: Arc<str>,
    operation: Operation,
    stream: StreamKind,
    max_line: usize,
  ) -> Self {
    Self {
      provider,
      operation,
      stream,
      level: log.level,
      width: log.width,
      max_line: max_line.max(1),
      pending: Vec::new(),
    }
  }

  fn push(&mut self, chunk: &[u8]) {
    for &byte in chunk {
      if byte == b'\n' {
        self.flush();
        continue;
      }
      self.pending.push(byte);
      if self.pending.len() >= self.max_line {
        self.flush_piece();
      }
    }
  }

  /// Log whatever is left after the stream closed.
  fn finish(&mut self) {
    if !self.pending.is_empty() {
      self.flush();
    }
  }

  /// Log a piece of an overlong line, holding back an incomplete UTF-8
  /// sequence at its end for the next piece.
  fn flush_piece(&mut self) {
    let cut = match std::str::from_utf8(&self.pending) {
      Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => e.valid_up_to(),
      _ => self.pending.len(),
    };
    let rest = self.pending.split_off(cut);
    self.flush();
    self.pending = rest;
  }

  fn flush(&mut self) {
    let raw = String::from_utf8_lossy(&self.pending);
    let line = raw.strip_suffix('\r').unwrap_or(&raw);
    let line = format!("{:<width$}", line, width = self.width);
    self.emit(&line);
    self.pending.clear();
  }

  fn emit(&self, line: &str) {
    let provider = &*self.provider;
    let operation = self.operation.as_str();
    let stream = self.stream;

    macro_rules! emit_at {
      ($macro:ident) => {
        tracing::$macro!(provider, operation, stream = %stream, "{}", line)
      };
    }

    match self.level {
      LogLevel::Trace => emit_at!(trace),
      LogLevel::Debug => emit_at!(debug),
      LogLevel::Info => emit_at!(info),
      LogLevel::Warn => emit_at!(warn),
      LogLevel::Error => emit_at!(error),
    }
  }
}

/// Drain `reader` to EOF, or until `stop` fires.
///
/// Returns the first `limit` bytes and whether anything was cut off.
pub(crate) async fn drain<R>(
  mut reader: R,
  mut logger: LineLogger,
  limit: usize,
  stop: CancellationToken,
) -> std::io::Result<CapturedStream>
where
  R: AsyncRead + Unpin,
{
  let mut buffer = BoundedBuffer::new(limit);
  let mut chunk = vec![0u8; CHUNK_SIZE];

  loop {
    let read = tokio::select! {
      read = reader.read(&mut chunk) => read?,
      _ = stop.cancelled() => break,
    };
    if read == 0 {
      break;
    }
    buffer.push(&chunk[..read]);
    logger.push(&chunk[..read]);
  }

  logger.finish();
  Ok(buffer.finish())
}
