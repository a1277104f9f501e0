//! Docker container runtime.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::EventMessage;
use bollard::system::EventsOptions;
use futures::StreamExt;

use grid_common::{ContainerId, GridError, GridResult};
use grid_network::NetworkAdapter;

use crate::container::{Container, ContainerConfig, ContainerRuntime};
use crate::events::{EventBus, RawEvent, Topic};

/// [`ContainerRuntime`] backed by the local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

fn runtime_error(e: bollard::errors::Error) -> GridError {
    GridError::Runtime {
        message: e.to_string(),
    }
}

impl DockerRuntime {
    /// Connect to the local daemon and verify it responds.
    pub async fn connect() -> GridResult<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(runtime_error)?;
        docker.ping().await.map_err(runtime_error)?;
        tracing::info!("Connected to Docker daemon");
        Ok(Self { docker })
    }

    /// Publish Docker container events on `bus` until the stream ends.
    ///
    /// Every event goes to the container topic. A router container starting
    /// is also published on the router topic.
    pub async fn publish_events(
        &self,
        bus: &EventBus,
        adapter: &dyn NetworkAdapter,
    ) -> GridResult<()> {
        let mut filters = HashMap::new();
        filters.insert("type".to_string(), vec!["container".to_string()]);

        let mut stream = Box::pin(self.docker.events(Some(EventsOptions::<String> {
            filters,
            ..Default::default()
        })));

        while let Some(message) = stream.next().await {
            let raw = raw_event(&message.map_err(runtime_error)?);

            let router_started = raw.status.as_deref() == Some("start")
                && raw
                    .from
                    .as_deref()
                    .is_some_and(|image| adapter.is_router_image(image));
            if router_started {
                bus.publish(Topic::RouterLifecycle, raw.clone());
            }
            bus.publish(Topic::ContainerLifecycle, raw);
        }

        tracing::warn!("Docker event stream ended");
        Ok(())
    }
}

/// Translate a Docker event into the bus representation.
pub fn raw_event(message: &EventMessage) -> RawEvent {
    let actor = message.actor.as_ref();
    RawEvent {
        id: actor.and_then(|a| a.id.clone()),
        status: message.action.clone(),
        from: actor
            .and_then(|a| a.attributes.as_ref())
            .and_then(|attrs| attrs.get("image").cloned()),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn get(&self, id: &ContainerId) -> GridResult<Container> {
        let info = self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => GridError::ContainerNotFound { id: id.to_string() },
                other => runtime_error(other),
            })?;

        let config = info.config.unwrap_or_default();
        let labels = config.labels.unwrap_or_default();

        Ok(Container::from_runtime(
            id.clone(),
            info.name.unwrap_or_default(),
            ContainerConfig {
                domain_name: config.domainname.unwrap_or_default(),
                host_name: config.hostname.unwrap_or_default(),
            },
            &labels,
        ))
    }

    async fn list(&self) -> GridResult<Vec<ContainerId>> {
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(runtime_error)?;

        Ok(summaries
            .into_iter()
            .filter_map(|summary| summary.id)
            .filter_map(|id| match ContainerId::new(id) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping container with invalid ID");
                    None
                }
            })
            .collect())
    }
}
