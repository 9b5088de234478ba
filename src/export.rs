//! Session snapshots for sharing comparison results.
//!
//! JSON keeps the nested structure. CSV flattens it to `key,value` rows,
//! one per top-level field, with nested values JSON-encoded into the cell.

use crate::backends::EngineSettings;
use crate::error::{Error, Result};
use crate::session::AbRatings;
use crate::settings::Favorite;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

impl ExportFormat {
    /// Guesses from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub version: String,
    /// RFC 3339, local time
    pub timestamp: String,
    pub engine: Option<String>,
    pub settings: Option<EngineSettings>,
    pub text: String,
    pub ab_ratings: AbRatings,
    pub favorites: Vec<Favorite>,
}

impl ExportSnapshot {
    pub fn new(
        engine: Option<String>,
        settings: Option<EngineSettings>,
        text: &str,
        ab_ratings: AbRatings,
        favorites: Vec<Favorite>,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Local::now().to_rfc3339(),
            engine,
            settings,
            text: text.to_string(),
            ab_ratings,
            favorites,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_csv(&self) -> Result<String> {
        let Value::Object(fields) = serde_json::to_value(self)? else {
            unreachable!("a struct always serializes to a JSON object");
        };

        let mut out = String::from("key,value\n");
        for (key, value) in fields {
            let cell = match value {
                Value::Null => String::new(),
                Value::String(s) => s,
                scalar @ (Value::Bool(_) | Value::Number(_)) => scalar.to_string(),
                nested => serde_json::to_string(&nested)?,
            };
            out.push_str(&csv_field(&key));
            out.push(',');
            out.push_str(&csv_field(&cell));
            out.push('\n');
        }
        Ok(out)
    }

    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => self.to_json(),
            ExportFormat::Csv => self.to_csv(),
        }
    }

    pub fn write_to(&self, path: &Path, format: ExportFormat) -> Result<()> {
        std::fs::write(path, self.render(format)?)?;
        Ok(())
    }
}

/// RFC 4180 quoting.
fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
