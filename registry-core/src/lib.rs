// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Core server registry semantics.
//!
//! This crate provides the document types stored by the registry and the
//! pure decision logic that decides which published version of a server is
//! the latest one. It is intentionally IO-free.
//!
//! **Architecture**: This is the Core Layer. Storage lives in
//! `registry-store-db`, orchestration in `registry-service`.
//!
//! # Key Modules
//!
//! - `server` - The open `ServerJson` document and its registry-managed envelope
//! - `version` - Latest-version resolution with the non-semver fallback

pub mod server;
pub mod version;

pub use server::{OFFICIAL_META_KEY, RegistryExtensions, ServerJson, ServerMeta, new_id};
pub use version::{LatestDecision, resolve_latest, supersedes};
