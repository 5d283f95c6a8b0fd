//! Store configuration.

use crate::StoreResult;
use serde::{Deserialize, Serialize};

/// Behavior switches for a [`FieldStore`](crate::FieldStore).
///
/// Every field has a default, so `{}` is a valid configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Reject writes through scalars and array gaps in `try_set_value`.
    #[serde(default)]
    pub strict_paths: bool,
    /// Log and skip panicking listeners instead of unwinding into the caller.
    #[serde(default = "default_catch_listener_panics")]
    pub catch_listener_panics: bool,
    /// Force zero-config mode on or off. `None` infers it from an empty baseline.
    #[serde(default)]
    pub zero_config: Option<bool>,
}

fn default_catch_listener_panics() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            strict_paths: false,
            catch_listener_panics: default_catch_listener_panics(),
            zero_config: None,
        }
    }
}

impl StoreConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(raw: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    #[must_use]
    pub fn with_strict_paths(mut self, strict: bool) -> Self {
        self.strict_paths = strict;
        self
    }

    #[must_use]
    pub fn with_catch_listener_panics(mut self, catch: bool) -> Self {
        self.catch_listener_panics = catch;
        self
    }

    #[must_use]
    pub fn with_zero_config(mut self, zero_config: bool) -> Self {
        self.zero_config = Some(zero_config);
        self
    }
}
