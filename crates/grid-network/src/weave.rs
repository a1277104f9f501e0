//! Weave router adapter.
//!
//! Drives the router through its CLI (`weave launch-router`, `weave attach`,
//! `weave detach`) and probes readiness through its HTTP status endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use grid_common::{ContainerId, GridError, GridResult};

use crate::adapter::NetworkAdapter;
use crate::image::ImageReference;

/// Weave router settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaveConfig {
    /// Path or name of the `weave` script.
    pub executable: String,
    /// Base URL of the router HTTP API.
    pub api_url: String,
    /// Repository of the router image.
    pub router_image: String,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            executable: "weave".to_string(),
            api_url: "http://127.0.0.1:6784".to_string(),
            router_image: "weaveworks/weave".to_string(),
        }
    }
}

/// [`NetworkAdapter`] backed by a local weave router.
pub struct WeaveAdapter {
    config: WeaveConfig,
    http: reqwest::Client,
    running: AtomicBool,
}

impl WeaveAdapter {
    /// Timeout for a single status probe.
    const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create an adapter. The router is considered down until [`start`](NetworkAdapter::start) succeeds.
    pub fn new(config: WeaveConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Adapter settings.
    #[must_use]
    pub const fn config(&self) -> &WeaveConfig {
        &self.config
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/status", self.config.api_url.trim_end_matches('/'));
        match self
            .http
            .get(&url)
            .timeout(Self::PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(%url, error = %e, "Weave status probe failed");
                false
            }
        }
    }

    async fn weave(&self, operation: &'static str, args: &[&str]) -> GridResult<()> {
        tracing::debug!(operation, ?args, "Running weave");

        // A call abandoned by its caller must not finish in the background.
        let output = Command::new(&self.config.executable)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GridError::AdapterCall {
                operation,
                message: format!("failed to execute {}: {e}", self.config.executable),
            })?;

        if !output.status.success() {
            return Err(GridError::AdapterCall {
                operation,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl NetworkAdapter for WeaveAdapter {
    fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn is_router_image(&self, image: &str) -> bool {
        ImageReference::parse(image)
            .map(|r| r.is_repository(&self.config.router_image))
            .unwrap_or(false)
    }

    async fn start(&self) -> GridResult<()> {
        self.running.store(false, Ordering::Release);

        if !self.probe().await {
            tracing::info!("Weave router not responding, launching");
            self.weave("start", &["launch-router"]).await?;
        }

        let up = self.probe().await;
        self.running.store(up, Ordering::Release);
        if !up {
            return Err(GridError::AdapterCall {
                operation: "start",
                message: format!("router at {} did not come up", self.config.api_url),
            });
        }

        tracing::info!("Weave router running");
        Ok(())
    }

    async fn attach_container(&self, id: &ContainerId, cidr: &str) -> GridResult<()> {
        self.weave("attach_container", &["attach", cidr, id.as_str()])
            .await?;
        tracing::info!(container_id = %id.short(), cidr, "Attached container to overlay");
        Ok(())
    }

    async fn migrate_container(&self, id: &ContainerId, cidr: &str) -> GridResult<()> {
        if let Err(e) = self.weave("migrate_container", &["detach", id.as_str()]).await {
            tracing::warn!(container_id = %id.short(), error = %e, "Failed to detach legacy overlay address");
        }
        self.weave("migrate_container", &["attach", cidr, id.as_str()])
            .await?;
        tracing::info!(container_id = %id.short(), cidr, "Migrated container to overlay");
        Ok(())
    }
}
