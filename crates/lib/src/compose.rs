//! Command composition.
//!
//! Lifecycle steps are written as independent command strings. Before one is
//! handed to the interpreter it goes through a [`Composer`], which applies the
//! shared command prefix and, when several commands must run as one script,
//! joins and isolates them.
//!
//! # Templates
//!
//! The joiner and isolator are `printf`-style templates:
//!
//! - `%s` - where a command is substituted
//! - `%%` - a literal `%`
//!
//! Any other `%` passes through unchanged. Substituted command text is never
//! scanned for placeholders, so commands may contain `%s` freely.
//!
//! # Example
//!
//! ```
//! use scriptres_lib::compose::Composer;
//!
//! let composer = Composer::new("set -e\n".to_string(), "%s && %s", "{ %s; }").unwrap();
//! assert_eq!(composer.compose(&["a", "b", "c"]), "set -e\n{ a && b && c; }");
//! assert_eq!(composer.compose(&["a"]), "set -e\na");
//! assert_eq!(composer.compose::<&str>(&[]), "");
//! ```

use crate::config::ConfigError;

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text, with `%%` already unescaped.
  Literal(String),

  /// A `%s` slot.
  Slot,
}

/// A parsed template with a fixed number of `%s` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
  segments: Vec<Segment>,
}

impl Template {
  /// Parse `source`, requiring exactly `expected` slots.
  ///
  /// `name` identifies the template in the error.
  pub fn parse(name: &'static str, source: &str, expected: usize) -> Result<Self, ConfigError> {
    let segments = parse(source);
    let found = segments.iter().filter(|s| matches!(s, Segment::Slot)).count();

    if found != expected {
      return Err(ConfigError::Template { name, expected, found });
    }

    Ok(Self { segments })
  }

  /// Substitute `args` into the slots, in order.
  ///
  /// `args` must have exactly as many entries as the template has slots,
  /// which [`Template::parse`] guarantees for callers in this module.
  fn render(&self, args: &[&str]) -> String {
    let mut out = String::new();
    let mut args = args.iter();

    for segment in &self.segments {
      match segment {
        Segment::Literal(text) => out.push_str(text),
        Segment::Slot => {
          if let Some(arg) = args.next() {
            out.push_str(arg);
          }
        }
      }
    }

    out
  }
}

/// Split a template into literal and slot segments.
fn parse(input: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.chars().peekable();

  while let Some(ch) = chars.next() {
    if ch != '%' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some('s') => {
        chars.next();
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Slot);
      }
      Some('%') => {
        chars.next();
        literal.push('%');
      }
      _ => literal.push('%'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  segments
}

/// Turns logical commands into the single text run by the interpreter.
#[derive(Debug, Clone)]
pub struct Composer {
  prefix: String,
  joiner: Template,
  isolator: Template,
}

impl Composer {
  /// Build a composer, validating the joiner (two slots) and isolator (one slot).
  pub fn new(prefix: String, joiner: &str, isolator: &str) -> Result<Self, ConfigError> {
    Ok(Self {
      prefix,
      joiner: Template::parse("command_joiner", joiner, 2)?,
      isolator: Template::parse("command_isolator", isolator, 1)?,
    })
  }

  /// Compose `commands` into one executable text.
  ///
  /// - no commands: empty string
  /// - one command: prefix + command
  /// - more: joined left to right, isolated once, then prefixed once
  pub fn compose<S: AsRef<str>>(&self, commands: &[S]) -> String {
    let mut iter = commands.iter().map(AsRef::as_ref);

    let Some(first) = iter.next() else {
      return String::new();
    };

    let mut body = first.to_string();
    let mut joined = false;
    for next in iter {
      body = self.joiner.render(&[&body, next]);
      joined = true;
    }

    if joined {
      body = self.isolator.render(&[&body]);
    }

    if self.prefix.is_empty() {
      body
    } else {
      format!("{}{}", self.prefix, body)
    }
  }
}
