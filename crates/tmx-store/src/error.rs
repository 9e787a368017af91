//! Error types for content store operations

use tmx_content::KeyError;

/// Errors raised by a content store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob stored under the key
    #[error("object not found: {0}")]
    NotFound(String),

    /// Key failed validation
    #[error("invalid object key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Backend refused the write
    #[error("write rejected for {key}: {reason}")]
    WriteRejected { key: String, reason: String },

    /// Backend could not be reached or answered with a fault
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// IO error on a filesystem-backed store
    #[error("io error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create IO error for a key
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }

    /// Create write rejection for a key
    pub fn write_rejected(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteRejected {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error means the object is absent
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::NotFound("migrations/mobile/current.json".to_string());
        assert!(err.to_string().contains("migrations/mobile/current.json"));
        assert!(err.is_not_found());

        let err = StoreError::write_rejected("k", "quota");
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "write rejected for k: quota");
    }
}
