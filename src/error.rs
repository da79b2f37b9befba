//! Error types for the compile pipeline.
//!
//! Every error here is raised before any artifact leaves the pipeline; the
//! outputs are only meaningful as a complete set.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
  /// Inconsistent hardware or software description
  #[error("configuration error: {reason}")]
  Config { reason: String },

  /// A class holds more leaves than its core range can store
  #[error("class {class} has {leaves} leaves but only {capacity} slots")]
  Capacity {
    class: usize,
    leaves: usize,
    capacity: usize,
  },

  /// An array, pointer or branch that does not fit where it is placed
  #[error("range error in {what}: {reason}")]
  Range { what: String, reason: String },

  /// Malformed ensemble model or sample matrix
  #[error("model error: {reason}")]
  Model { reason: String },

  #[error("I/O error: {source}")]
  Io {
    #[from]
    source: std::io::Error,
  },

  #[error("failed to parse TOML: {source}")]
  Toml {
    #[from]
    source: toml::de::Error,
  },

  #[error("failed to parse JSON: {source}")]
  Json {
    #[from]
    source: serde_json::Error,
  },
}

impl CompileError {
  pub fn config(reason: impl Into<String>) -> Self {
    Self::Config { reason: reason.into() }
  }

  pub fn range(what: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::Range {
      what: what.into(),
      reason: reason.into(),
    }
  }

  pub fn model(reason: impl Into<String>) -> Self {
    Self::Model { reason: reason.into() }
  }
}
