//! Update availability checks against the Central service

use std::sync::Arc;

use cybersensei_http::{join_url, HttpClientTrait};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::{
    error::{Result, UpdateError},
    models::{UpdateCheckResponse, UpdateCheckResult},
};

/// Asks Central whether a newer package exists for this tenant
#[derive(Clone)]
pub struct UpdateChecker {
    http: Arc<dyn HttpClientTrait>,
    central_url: String,
    tenant_id: String,
    current_version: Arc<RwLock<String>>,
}

impl UpdateChecker {
    /// Create a new update checker
    pub fn new(
        http: Arc<dyn HttpClientTrait>,
        central_url: impl Into<String>,
        tenant_id: impl Into<String>,
        current_version: Arc<RwLock<String>>,
    ) -> Self {
        Self {
            http,
            central_url: central_url.into(),
            tenant_id: tenant_id.into(),
            current_version,
        }
    }

    /// `GET /update/check?tenantId=..&version=..`
    pub async fn check_for_updates(&self) -> Result<UpdateCheckResult> {
        let version = self.current_version.read().clone();
        let url = join_url(&self.central_url, "/update/check");

        info!(tenant_id = %self.tenant_id, version = %version, "Checking for updates");

        let response = self
            .http
            .get(&url, &[("tenantId", self.tenant_id.as_str()), ("version", version.as_str())])
            .await?;

        let body: UpdateCheckResponse = response
            .json()
            .await
            .map_err(|e| UpdateError::malformed(format!("update check body: {e}")))?;

        let result = UpdateCheckResult::from_response(body)?;

        match &result.package {
            Some(package) => {
                info!(
                    current = %result.current_version,
                    latest = %package.version,
                    size_bytes = package.file_size,
                    breaking = package.breaking,
                    security = package.security_update,
                    "Update available"
                );
                if package.breaking {
                    warn!(version = %package.version, "Update contains breaking changes");
                }
            }
            None => info!(
                current = %result.current_version,
                latest = ?result.latest_version,
                message = ?result.message,
                "Node is up to date"
            ),
        }

        Ok(result)
    }

    /// Version reported on the next check
    pub fn current_version(&self) -> String {
        self.current_version.read().clone()
    }
}
