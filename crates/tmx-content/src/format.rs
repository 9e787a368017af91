//! Declared serialization of stored content

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Serialization a stored blob declares. The engine never decodes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// Structured JSON text
    #[default]
    Json,
    /// Comma-separated export
    Csv,
}

impl ContentFormat {
    /// File extension, without the dot
    #[inline]
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            ContentFormat::Json => "json",
            ContentFormat::Csv => "csv",
        }
    }

    /// MIME type attached when the blob is written
    #[inline]
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            ContentFormat::Json => "application/json; charset=utf-8",
            ContentFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

impl Display for ContentFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
