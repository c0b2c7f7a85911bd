//! Binding reference paths.
//!
//! A path addresses one value inside the execution's accumulated data.
//!
//! Grammar:
//!
//! ```text
//! path    := "$" segment*
//! segment := "." field | "[" index "]"
//! field   := one or more characters other than '.', '[' and ']'
//! index   := decimal digits
//! ```
//!
//! `$` alone addresses the whole document. `$.objectKey` addresses a top-level
//! field, `$.items[0].name` walks into arrays and nested objects. There is no
//! wildcard, filter or quoting: a path resolves to exactly one value or to
//! nothing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
  Field(String),
  Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BindingPath {
  segments: Vec<PathSegment>,
}

impl BindingPath {
  /// The path addressing the whole document (`$`).
  pub fn root() -> Self {
    Self {
      segments: Vec::new(),
    }
  }

  pub fn parse(input: &str) -> Result<Self, WorkflowError> {
    let invalid = |message: &str| WorkflowError::InvalidPath {
      path: input.to_string(),
      message: message.to_string(),
    };

    let rest = input
      .strip_prefix('$')
      .ok_or_else(|| invalid("path must start with '$'"))?;

    let mut segments = Vec::new();
    let mut chars = rest.chars().peekable();

    while let Some(c) = chars.next() {
      match c {
        '.' => {
          let mut field = String::new();
          while let Some(&next) = chars.peek() {
            if next == '.' || next == '[' || next == ']' {
              break;
            }
            field.push(next);
            chars.next();
          }
          if field.is_empty() {
            return Err(invalid("empty field name"));
          }
          segments.push(PathSegment::Field(field));
        }
        '[' => {
          let mut digits = String::new();
          loop {
            match chars.next() {
              Some(']') => break,
              Some(d) if d.is_ascii_digit() => digits.push(d),
              Some(_) => return Err(invalid("array index must be a non-negative integer")),
              None => return Err(invalid("unterminated array index")),
            }
          }
          let index = digits
            .parse::<usize>()
            .map_err(|_| invalid("array index must be a non-negative integer"))?;
          segments.push(PathSegment::Index(index));
        }
        _ => return Err(invalid("expected '.' or '['")),
      }
    }

    Ok(Self { segments })
  }

  pub fn segments(&self) -> &[PathSegment] {
    &self.segments
  }

  /// Resolve the path against a document.
  ///
  /// Returns `None` when any segment is missing or addresses the wrong kind
  /// of value (a field on an array, an index on an object).
  pub fn resolve<'a>(&self, data: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
    let mut current = data;
    for segment in &self.segments {
      current = match segment {
        PathSegment::Field(name) => current.as_object()?.get(name)?,
        PathSegment::Index(index) => current.as_array()?.get(*index)?,
      };
    }
    Some(current)
  }
}

impl fmt::Display for BindingPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "$")?;
    for segment in &self.segments {
      match segment {
        PathSegment::Field(name) => write!(f, ".{}", name)?,
        PathSegment::Index(index) => write!(f, "[{}]", index)?,
      }
    }
    Ok(())
  }
}

impl TryFrom<String> for BindingPath {
  type Error = WorkflowError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<BindingPath> for String {
  fn from(path: BindingPath) -> Self {
    path.to_string()
  }
}
