// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! SQLite document store for server registry versions.
//!
//! This crate stores every published version of every server as one JSON
//! document and answers the listing and lookup queries the registry needs.
//! It also owns the per-name publish lock that keeps exactly one version of
//! each server marked latest.
//!
//! **Architecture**: This is the Database Layer. Document types and the
//! version resolver live in `registry-core`.
//!
//! # Key Features
//!
//! - Filtered, cursor-paginated listings ordered by `versionId`
//! - Atomic publish (unmark previous latest + insert) in one transaction
//! - Per-name publish serialization with cancellation
//! - Pooled connections with warm reserve and periodic recycling
//!
//! # Example
//!
//! ```ignore
//! use registry_store_db::{Database, PoolConfig, ServerFilter};
//!
//! let db = Database::open("registry.sqlite", PoolConfig::default()).await?;
//! let page = db.list(&ServerFilter::default(), None, 30, &cancel).await?;
//! for server in &page.servers {
//!     println!("{} {}", server.name, server.version);
//! }
//! ```

mod connection;
mod database;
mod error;
mod filter;
pub mod lock;
pub mod pool;
mod query;
mod schema;
mod types;
mod write;

pub use connection::StoreDb;
pub use database::Database;
pub use error::{Error, ErrorKind, Result};
pub use filter::ServerFilter;
pub use pool::{PoolConfig, PoolStats};
pub use schema::SCHEMA_VERSION;
pub use types::*;
