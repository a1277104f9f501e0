//! DNS registrars for overlay service discovery.
//!
//! [`WeaveDns`] talks to the router's name API; [`MemoryDns`] keeps records
//! in-process.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use parking_lot::RwLock;

use grid_common::{ContainerId, GridError, GridResult};

use crate::weave::WeaveConfig;

/// Stores and removes name to address records.
#[async_trait]
pub trait DnsRegistrar: Send + Sync {
    /// Register `name` -> `ip` on behalf of container `id`.
    async fn add_dns(&self, id: &ContainerId, ip: Ipv4Addr, name: &str) -> GridResult<()>;

    /// Remove every record registered for container `id`.
    async fn remove_all(&self, id: &ContainerId) -> GridResult<()>;
}

/// DNS record for a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Fully qualified name.
    pub name: String,
    /// IPv4 address.
    pub ip: Ipv4Addr,
}

/// In-process DNS record table.
#[derive(Debug, Default)]
pub struct MemoryDns {
    records: RwLock<HashMap<ContainerId, Vec<DnsRecord>>>,
}

impl MemoryDns {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a name to the first registered address.
    pub fn resolve(&self, name: &str) -> Option<Ipv4Addr> {
        self.records
            .read()
            .values()
            .flatten()
            .find(|r| r.name == name)
            .map(|r| r.ip)
    }

    /// Records registered for one container, in registration order.
    pub fn records_for(&self, id: &ContainerId) -> Vec<DnsRecord> {
        self.records.read().get(id).cloned().unwrap_or_default()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.records.read().values().map(Vec::len).sum()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DnsRegistrar for MemoryDns {
    async fn add_dns(&self, id: &ContainerId, ip: Ipv4Addr, name: &str) -> GridResult<()> {
        let mut records = self.records.write();
        let entries = records.entry(id.clone()).or_default();
        if !entries.iter().any(|r| r.name == name && r.ip == ip) {
            entries.push(DnsRecord {
                name: name.to_string(),
                ip,
            });
        }

        tracing::debug!(container_id = %id.short(), fqdn = name, %ip, "DNS record added");
        Ok(())
    }

    async fn remove_all(&self, id: &ContainerId) -> GridResult<()> {
        let removed = self.records.write().remove(id).map_or(0, |r| r.len());
        tracing::debug!(container_id = %id.short(), removed, "DNS records removed");
        Ok(())
    }
}

/// [`DnsRegistrar`] backed by the weave router's name API.
pub struct WeaveDns {
    api_url: String,
    http: reqwest::Client,
}

impl WeaveDns {
    /// Create a registrar against the router configured in `config`.
    pub fn new(config: &WeaveConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn name_url(&self, id: &ContainerId) -> String {
        format!("{}/name/{}", self.api_url, id)
    }
}

fn dns_error(e: reqwest::Error) -> GridError {
    GridError::Dns {
        message: e.to_string(),
    }
}

#[async_trait]
impl DnsRegistrar for WeaveDns {
    async fn add_dns(&self, id: &ContainerId, ip: Ipv4Addr, name: &str) -> GridResult<()> {
        let url = format!("{}/{ip}", self.name_url(id));
        self.http
            .put(&url)
            .form(&[("fqdn", name)])
            .send()
            .await
            .map_err(dns_error)?
            .error_for_status()
            .map_err(dns_error)?;

        tracing::debug!(container_id = %id.short(), fqdn = name, %ip, "DNS record added");
        Ok(())
    }

    async fn remove_all(&self, id: &ContainerId) -> GridResult<()> {
        self.http
            .delete(self.name_url(id))
            .send()
            .await
            .map_err(dns_error)?
            .error_for_status()
            .map_err(dns_error)?;

        tracing::debug!(container_id = %id.short(), "DNS records removed");
        Ok(())
    }
}
