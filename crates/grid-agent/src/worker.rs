//! Overlay worker.
//!
//! Classifies lifecycle events and keeps a container's overlay attachment and
//! DNS records in step with them. Nothing is remembered between events:
//! container snapshots and adapter readiness are read fresh each time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use grid_common::{GridError, GridResult};
use grid_network::{DnsRegistrar, NetworkAdapter, OverlayCidr};

use crate::container::{Container, ContainerRuntime, Encoding};
use crate::dns_names::dns_names;
use crate::events::{Envelope, EventStatus, LifecycleEvent, RawEvent, Topic};

/// Reacts to router and container lifecycle events.
pub struct OverlayWorker {
    adapter: Arc<dyn NetworkAdapter>,
    runtime: Arc<dyn ContainerRuntime>,
    dns: Arc<dyn DnsRegistrar>,
    call_timeout: Duration,
}

impl OverlayWorker {
    /// Default bound on a single collaborator call.
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a worker over its three collaborators.
    pub fn new(
        adapter: Arc<dyn NetworkAdapter>,
        runtime: Arc<dyn ContainerRuntime>,
        dns: Arc<dyn DnsRegistrar>,
    ) -> Self {
        Self {
            adapter,
            runtime,
            dns,
            call_timeout: Self::DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the bound on a single collaborator call.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Handle one envelope from either topic. Never fails; problems are logged.
    pub async fn dispatch(&self, envelope: Envelope) {
        match envelope.topic {
            Topic::RouterLifecycle => self.on_router_start(&envelope.event).await,
            Topic::ContainerLifecycle => match LifecycleEvent::try_from(envelope.event) {
                Ok(event) => self.on_container_event(&event).await,
                Err(e) => tracing::warn!(error = %e, "Dropping container event"),
            },
        }
    }

    /// Router topic: (re)start the adapter whatever the message says, then
    /// resync running containers.
    pub async fn on_router_start(&self, event: &RawEvent) {
        tracing::debug!(id = ?event.id, status = ?event.status, "Router lifecycle event");
        self.start_adapter().await;
    }

    /// Container topic.
    pub async fn on_container_event(&self, event: &LifecycleEvent) {
        if event.status == EventStatus::Restart
            && event
                .from
                .as_deref()
                .is_some_and(|image| self.adapter.is_router_image(image))
        {
            tracing::info!(container_id = %event.id.short(), "Router restarted");
            self.start_adapter().await;
            return;
        }

        if !self.adapter.running() {
            tracing::debug!(
                container_id = %event.id.short(),
                status = %event.status,
                "Network adapter not running, ignoring event"
            );
            return;
        }

        match event.status {
            EventStatus::Start => {
                match self
                    .bounded("get_container", self.runtime.get(&event.id))
                    .await
                {
                    Ok(container) => self.start_container(&container).await,
                    Err(e) => tracing::warn!(
                        container_id = %event.id.short(),
                        error = %e,
                        "Failed to resolve started container"
                    ),
                }
            }
            EventStatus::Destroy => self.on_container_destroy(event).await,
            EventStatus::Restart | EventStatus::Other(_) => {}
        }
    }

    /// Attach the container to the overlay and register its DNS names.
    ///
    /// Does nothing for containers without an overlay address. DNS
    /// registration runs even when the attach fails.
    pub async fn start_container(&self, container: &Container) {
        if !container.has_overlay() {
            tracing::debug!(container_id = %container.id.short(), "No overlay address");
            return;
        }

        if let Err(e) = self.attach_overlay(container).await {
            tracing::warn!(container_id = %container.id.short(), error = %e, "Failed to attach overlay");
        }
        if let Err(e) = self.register_container_dns(container).await {
            tracing::error!(container_id = %container.id.short(), error = %e, "Cannot derive DNS names");
        }
    }

    /// Issue exactly one attach or migrate call for the container.
    ///
    /// Legacy containers carry a bare `overlay_ip` and are migrated onto the
    /// canonical prefix; all others are attached at their CIDR as recorded.
    pub async fn attach_overlay(&self, container: &Container) -> GridResult<()> {
        let address = container
            .overlay_address()?
            .ok_or_else(|| GridError::InvalidCidr {
                value: String::new(),
            })?;

        match address.encoding {
            Encoding::Legacy => {
                let cidr = OverlayCidr::new(address.ip, address.prefix_len)
                    .canonical()
                    .to_string();
                tracing::debug!(container_id = %container.id.short(), %cidr, "Migrating legacy overlay address");
                self.bounded(
                    "migrate_container",
                    self.adapter.migrate_container(&container.id, &cidr),
                )
                .await
            }
            Encoding::Current => {
                let cidr = container.overlay_cidr.as_deref().unwrap_or_default();
                self.bounded(
                    "attach_container",
                    self.adapter.attach_container(&container.id, cidr),
                )
                .await
            }
        }
    }

    /// Register every DNS name of the container; returns how many succeeded.
    ///
    /// A failed registration is logged and does not stop the remaining ones.
    pub async fn register_container_dns(&self, container: &Container) -> GridResult<usize> {
        let names = dns_names(container)?;
        let mut registered = 0;

        for name in &names {
            match self
                .bounded(
                    "add_dns",
                    self.dns.add_dns(&name.container_id, name.ip, &name.name),
                )
                .await
            {
                Ok(()) => registered += 1,
                Err(e) => tracing::warn!(
                    container_id = %container.id.short(),
                    fqdn = %name.name,
                    error = %e,
                    "Failed to add DNS name"
                ),
            }
        }

        tracing::debug!(
            container_id = %container.id.short(),
            registered,
            total = names.len(),
            "Registered DNS names"
        );
        Ok(registered)
    }

    /// Release every DNS record of a destroyed container.
    pub async fn on_container_destroy(&self, event: &LifecycleEvent) {
        if let Err(e) = self
            .bounded("remove_all", self.dns.remove_all(&event.id))
            .await
        {
            tracing::warn!(container_id = %event.id.short(), error = %e, "Failed to remove DNS records");
        }
    }

    async fn start_adapter(&self) {
        if let Err(e) = self.bounded("start", self.adapter.start()).await {
            tracing::warn!(error = %e, "Failed to start network adapter");
            return;
        }
        self.resync().await;
    }

    /// Run [`start_container`](Self::start_container) for every running container.
    ///
    /// Start events are dropped while the adapter is down, so this runs each
    /// time the adapter comes up.
    pub async fn resync(&self) {
        let ids = match self.bounded("list_containers", self.runtime.list()).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list running containers");
                return;
            }
        };

        tracing::info!(containers = ids.len(), "Resyncing running containers");
        for id in &ids {
            match self.bounded("get_container", self.runtime.get(id)).await {
                Ok(container) => self.start_container(&container).await,
                Err(e) => tracing::warn!(
                    container_id = %id.short(),
                    error = %e,
                    "Failed to resolve running container"
                ),
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = GridResult<T>>,
    ) -> GridResult<T> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(GridError::Timeout {
                    operation,
                    seconds: self.call_timeout.as_secs(),
                })
            })
    }
}
