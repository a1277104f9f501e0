//! In-memory collaborators for worker tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use grid_agent::container::{ContainerConfig, ContainerLabels, StackName};
use grid_agent::{Container, ContainerRuntime, Mailbox, OverlayWorker};
use grid_common::{ContainerId, GridError, GridResult};
use grid_network::{DnsRegistrar, MemoryDns, NetworkAdapter};

/// A call the adapter received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    Start,
    Attach(String, String),
    Migrate(String, String),
}

/// Adapter that records calls and can be told to fail or hang.
#[derive(Default)]
pub struct FakeAdapter {
    running: AtomicBool,
    fail: AtomicBool,
    hang: AtomicBool,
    calls: Mutex<Vec<AdapterCall>>,
}

impl FakeAdapter {
    pub fn running() -> Arc<Self> {
        let adapter = Self::default();
        adapter.running.store(true, Ordering::SeqCst);
        Arc::new(adapter)
    }

    pub fn stopped() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_calls(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn hang_calls(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().clone()
    }

    async fn record(&self, call: AdapterCall) -> GridResult<()> {
        self.calls.lock().push(call);
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(GridError::AdapterCall {
                operation: "fake",
                message: "refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkAdapter for FakeAdapter {
    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_router_image(&self, image: &str) -> bool {
        image.starts_with("weaveworks/weave:") || image == "weaveworks/weave"
    }

    async fn start(&self) -> GridResult<()> {
        self.record(AdapterCall::Start).await?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn attach_container(&self, id: &ContainerId, cidr: &str) -> GridResult<()> {
        self.record(AdapterCall::Attach(id.to_string(), cidr.to_string()))
            .await
    }

    async fn migrate_container(&self, id: &ContainerId, cidr: &str) -> GridResult<()> {
        self.record(AdapterCall::Migrate(id.to_string(), cidr.to_string()))
            .await
    }
}

/// Runtime serving fixed snapshots, all of them running. Unknown IDs are not
/// found; IDs listed in `panic_on` make `get` panic.
#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<HashMap<ContainerId, Container>>,
    panic_on: Mutex<Vec<String>>,
    lookups: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn with(containers: impl IntoIterator<Item = Container>) -> Arc<Self> {
        let runtime = Self::default();
        for c in containers {
            runtime.containers.lock().insert(c.id.clone(), c);
        }
        Arc::new(runtime)
    }

    pub fn panic_on(&self, id: &str) {
        self.panic_on.lock().push(id.to_string());
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn get(&self, id: &ContainerId) -> GridResult<Container> {
        self.lookups.lock().push(id.to_string());
        assert!(
            !self.panic_on.lock().iter().any(|p| p == id.as_str()),
            "runtime exploded on {id}"
        );
        self.containers
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| GridError::ContainerNotFound { id: id.to_string() })
    }

    async fn list(&self) -> GridResult<Vec<ContainerId>> {
        let mut ids: Vec<ContainerId> = self.containers.lock().keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}

/// Registrar that records calls on top of a [`MemoryDns`] table.
#[derive(Default)]
pub struct RecordingDns {
    pub table: MemoryDns,
    added: Mutex<Vec<(String, Ipv4Addr, String)>>,
    removed: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingDns {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_calls(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn added(&self) -> Vec<(String, Ipv4Addr, String)> {
        self.added.lock().clone()
    }

    pub fn added_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.added().into_iter().map(|(_, _, n)| n).collect();
        names.sort();
        names
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().clone()
    }
}

#[async_trait]
impl DnsRegistrar for RecordingDns {
    async fn add_dns(&self, id: &ContainerId, ip: Ipv4Addr, name: &str) -> GridResult<()> {
        self.added
            .lock()
            .push((id.to_string(), ip, name.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(GridError::Dns {
                message: "refused".to_string(),
            });
        }
        self.table.add_dns(id, ip, name).await
    }

    async fn remove_all(&self, id: &ContainerId) -> GridResult<()> {
        self.removed.lock().push(id.to_string());
        self.table.remove_all(id).await
    }
}

/// Worker wired to fakes.
pub struct Harness {
    pub adapter: Arc<FakeAdapter>,
    pub runtime: Arc<FakeRuntime>,
    pub dns: Arc<RecordingDns>,
    pub worker: Arc<OverlayWorker>,
}

impl Harness {
    pub fn mailbox(&self, shards: usize) -> Mailbox {
        Mailbox::spawn(Arc::clone(&self.worker), shards, 16)
    }

    pub fn new(adapter: Arc<FakeAdapter>, runtime: Arc<FakeRuntime>) -> Self {
        let dns = RecordingDns::new();
        let worker = Arc::new(
            OverlayWorker::new(adapter.clone(), runtime.clone(), dns.clone())
                .with_call_timeout(Duration::from_secs(5)),
        );
        Self {
            adapter,
            runtime,
            dns,
            worker,
        }
    }
}

pub fn id(s: &str) -> ContainerId {
    ContainerId::new(s).unwrap()
}

/// `redis-2` of grid `foo` in `stack`.
pub fn redis(id_str: &str, stack: StackName, exposed: bool) -> Container {
    let domain = match stack.name() {
        Some(stack) => format!("{stack}.foo.kontena.local"),
        None => "foo.kontena.local".to_string(),
    };
    Container::new(id(id_str))
        .with_name("redis-2")
        .with_overlay_cidr("10.81.128.1/16")
        .with_config(ContainerConfig {
            domain_name: domain,
            host_name: "redis-2".to_string(),
        })
        .with_labels(ContainerLabels {
            stack,
            grid_name: Some("foo".to_string()),
            service_name: Some("redis".to_string()),
            instance_number: Some("2".to_string()),
            container_name: Some("redis-2".to_string()),
            exposed,
        })
}
