//! Error types for record persistence.

use std::fmt;

use thiserror::Error;

/// Structured classification for store/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure (unique/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Filesystem or transport IO failure.
    Io,
    /// A column could not be decoded into the expected type.
    Decode,
    /// Unclassified database failure.
    Other,
}

impl StoreDbErrorKind {
    /// Classifies a driver error.
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Decode,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StoreDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::Io => "io",
            Self::Decode => "decode",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> StoreDbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return StoreDbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return StoreDbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked") || message.contains("database is busy") {
        return StoreDbErrorKind::BusyOrLocked;
    }

    StoreDbErrorKind::Other
}

/// Errors that can occur while persisting records.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification of the driver failure.
        kind: StoreDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// A list column could not be encoded as JSON.
    #[error("failed to serialize column '{column}': {message}")]
    Serialize {
        /// The column being written.
        column: &'static str,
        /// The serializer's message.
        message: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: StoreDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl StoreError {
    /// Creates a serialization error for `column`.
    #[must_use]
    pub fn serialize(column: &'static str, err: &serde_json::Error) -> Self {
        Self::Serialize {
            column,
            message: err.to_string(),
        }
    }

    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<StoreDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::Serialize { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_database_message() {
        let err = StoreError::Database {
            kind: StoreDbErrorKind::BusyOrLocked,
            message: "database is locked".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("busy_or_locked"));
        assert!(msg.contains("database is locked"));
        assert_eq!(err.database_kind(), Some(StoreDbErrorKind::BusyOrLocked));
    }

    #[test]
    fn test_store_error_from_sqlx_pool_timeout() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.database_kind(), Some(StoreDbErrorKind::PoolTimeout));
    }

    #[test]
    fn test_store_error_serialize_has_no_db_kind() {
        let source = serde_json::from_str::<Vec<String>>("[1]").unwrap_err();
        let err = StoreError::serialize("authors", &source);
        assert!(err.to_string().contains("authors"));
        assert_eq!(err.database_kind(), None);
    }
}
