// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Result types for registry database queries.

use registry_core::ServerJson;

/// Default page size when the caller passes a non-positive limit.
pub const DEFAULT_LIST_LIMIT: i64 = 10;

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerPage {
    /// Versions ordered by ascending `versionId`.
    pub servers: Vec<ServerJson>,
    /// `versionId` of the last row when the page was full; `None` once exhausted.
    ///
    /// The order is a stable total order over identifiers, not publication order.
    pub next_cursor: Option<String>,
}
