// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Publish coordination, listing and configuration for the server registry.

pub mod config;
pub mod error;
pub mod seed;
pub mod service;

pub use config::Config;
pub use error::{Result, ServiceError};
pub use seed::SeedReport;
pub use service::{ListMetadata, ListOptions, RegistryService, ServerListResponse};
