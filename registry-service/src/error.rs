// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

use registry_store_db::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Store(#[from] registry_store_db::Error),

    #[error("Invalid server: {0}")]
    InvalidServer(String),

    #[error("Invalid version: cannot publish duplicate version {version} of {name}")]
    DuplicateVersion { name: String, version: String },

    #[error("Server {name} already has the maximum of {limit} versions")]
    TooManyVersions { name: String, limit: usize },

    #[error("Stored record is missing registry metadata: {0}")]
    CorruptRecord(String),

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Seed file error: {0}")]
    Seed(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn invalid_server(message: impl Into<String>) -> Self {
        Self::InvalidServer(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Classify this error for the boundary layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            Self::InvalidServer(_) | Self::DuplicateVersion { .. } | Self::TooManyVersions { .. } => {
                ErrorKind::InvalidInput
            }
            Self::CorruptRecord(_)
            | Self::Io { .. }
            | Self::Config(_)
            | Self::Toml(_)
            | Self::Seed(_) => ErrorKind::Internal,
        }
    }
}

/// Helper trait for adding context to IO errors
pub trait IoContext<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ServiceError::io(f(), e))
    }
}
