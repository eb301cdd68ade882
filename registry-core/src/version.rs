// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Latest-version resolution.
//!
//! Versions are free-form strings. When both the new and the current latest
//! version parse as semantic versions they are ordered by semver precedence.
//! A new version that does not parse always becomes latest, so a badly
//! versioned publish is still discoverable as the current one. Histories
//! mixing semver and non-semver strings therefore have no total order.

use std::cmp::Ordering;

use semver::Version;

/// What publishing a new version does to the latest flag of its server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestDecision {
    /// Value of `isLatest` for the new record.
    pub is_latest: bool,
    /// Whether the current latest record must be unmarked.
    pub unmark_previous: bool,
}

/// Decide whether `new_version` supersedes `current_latest`.
///
/// `current_latest` is `None` when the server has no published versions.
pub fn resolve_latest(new_version: &str, current_latest: Option<&str>) -> LatestDecision {
    let Some(current) = current_latest else {
        return LatestDecision {
            is_latest: true,
            unmark_previous: false,
        };
    };

    let is_latest = supersedes(new_version, current);
    LatestDecision {
        is_latest,
        unmark_previous: is_latest,
    }
}

/// Whether a newly published `new_version` replaces `current` as latest.
///
/// This is a decision about a publish, not an ordering: a non-semver
/// `new_version` supersedes anything, including another non-semver string
/// that would in turn supersede it. When both parse, semver precedence
/// applies (build metadata is ignored). A semver `new_version` never
/// supersedes a non-semver `current`.
pub fn supersedes(new_version: &str, current: &str) -> bool {
    match (Version::parse(new_version), Version::parse(current)) {
        (Ok(new), Ok(current)) => precedence(&new, &current) == Ordering::Greater,
        (Err(_), _) => true,
        (Ok(_), Err(_)) => false,
    }
}

fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        // semver's Prerelease orders the empty prerelease above any other.
        .then_with(|| a.pre.cmp(&b.pre))
}
