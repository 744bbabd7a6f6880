//! Error handling for xformhub-store
//!
//! Wraps xformhub-core ExError with store-specific helpers

use xformhub_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create a serialization error for stored JSON columns
pub fn json_error(operation: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// A planned table name is already taken in the database
pub fn table_exists(table: &str, xpath: &str) -> ExError {
    ExError::new(ExErrorKind::IdentifierCollision)
        .with_op("create_tables")
        .with_xpath(xpath.to_string())
        .with_message(format!("Table {} already exists", table))
}

/// No registered form with this id
pub fn form_not_found(form_id: i64) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_form_id(form_id)
        .with_message("Schema not found")
}
