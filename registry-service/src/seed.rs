// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Bulk import of a JSON array of servers.

use std::path::Path;

use registry_core::ServerJson;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{IoContext, Result, ServiceError};
use crate::service::RegistryService;

/// Outcome of [`RegistryService::import_seed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub imported: usize,
    /// Versions already present.
    pub skipped: usize,
}

impl RegistryService {
    /// Publish every server in the JSON array at `path`, in file order.
    ///
    /// Versions that already exist are skipped so an import can be re-run.
    /// Any other failure stops the import; servers published before it stay.
    pub async fn import_seed(&self, path: &Path, cancel: &CancellationToken) -> Result<SeedReport> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .io_context(|| format!("Failed to read seed file at {}", path.display()))?;
        let servers: Vec<ServerJson> = serde_json::from_str(&contents)?;
        info!("Importing {} servers from {}", servers.len(), path.display());

        let mut report = SeedReport::default();
        for server in servers {
            match self.publish(server, cancel).await {
                Ok(_) => report.imported += 1,
                Err(ServiceError::DuplicateVersion { name, version }) => {
                    warn!("Skipping {name} {version}: already published");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Seed import finished: {} imported, {} skipped",
            report.imported, report.skipped
        );
        Ok(report)
    }
}
