// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Error types for registry database operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for registry database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Transport-facing classification of a failure.
///
/// The boundary layer maps these to responses; it never inspects messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    Cancelled,
    Internal,
}

/// Errors that can occur during registry database operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to open database with context
    #[error("Failed to open database at '{path}': {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Database written by a newer schema
    #[error("Schema version mismatch: supported up to {supported}, found {found}")]
    SchemaVersionMismatch { supported: i32, found: i32 },

    /// Document (de)serialization failed
    #[error("Failed to encode server document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No matching record
    #[error("Record not found")]
    NotFound,

    /// Caller supplied something unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Connection pool has been closed
    #[error("Connection pool is closed")]
    PoolClosed,

    /// Timed out waiting for a pooled connection
    #[error("Timed out acquiring a database connection after {0:?}")]
    AcquireTimeout(std::time::Duration),

    /// Blocking database task failed to complete
    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Classify this error for the boundary layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Sqlite(e) if is_constraint_violation(e) => ErrorKind::Conflict,
            Self::Sqlite(_)
            | Self::DatabaseOpen { .. }
            | Self::SchemaVersionMismatch { .. }
            | Self::Serialization(_)
            | Self::PoolClosed
            | Self::AcquireTimeout(_)
            | Self::Task(_) => ErrorKind::Internal,
        }
    }

    /// Whether the connection that produced this error should be discarded.
    pub(crate) fn poisons_connection(&self) -> bool {
        matches!(self, Self::Sqlite(e) if !is_constraint_violation(e)
            && !matches!(e, rusqlite::Error::QueryReturnedNoRows))
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}
