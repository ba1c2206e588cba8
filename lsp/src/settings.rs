//! Settings-file model.
//!
//! The caller may supply a JSON document. The whole document travels
//! verbatim as the `initializationOptions` of the handshake; the
//! formatting `options` argument is the object found at
//! `settings.xml.format` inside it.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

const FORMAT_OPTIONS_POINTER: &str = "/settings/xml/format";

/// The parsed settings document. Defaults to an empty object when no
/// file is given.
#[derive(Debug, Clone)]
pub struct Settings {
    document: Value,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            document: Value::Object(serde_json::Map::new()),
        }
    }
}

impl Settings {
    /// Load settings from an optional file path. A missing path yields
    /// the empty default; an unreadable or malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let document = serde_json::from_str(&raw)
            .with_context(|| format!("settings file {} is not valid JSON", path.display()))?;
        Ok(Self { document })
    }

    /// The full document, forwarded as `initializationOptions`.
    #[must_use]
    pub fn initialization_options(&self) -> &Value {
        &self.document
    }

    /// The formatting options object at `settings.xml.format`, or `{}`
    /// when that path is absent.
    #[must_use]
    pub fn format_options(&self) -> Value {
        self.document
            .pointer(FORMAT_OPTIONS_POINTER)
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }
}
