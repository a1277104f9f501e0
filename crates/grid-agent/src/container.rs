//! Container snapshots as seen by the agent.
//!
//! A [`Container`] is fetched fresh from the [`ContainerRuntime`] for every
//! event and never cached. Grid metadata arrives as string labels and is
//! extracted into [`ContainerLabels`] once, at the runtime boundary.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use async_trait::async_trait;

use grid_common::{ContainerId, GridError, GridResult};
use grid_network::OverlayCidr;

/// Well-known label keys.
pub mod labels {
    /// Overlay address with prefix, e.g. `10.81.1.1/16`.
    pub const OVERLAY_CIDR: &str = "io.kontena.container.overlay_cidr";
    /// Overlay network name; written only by agents using the current encoding.
    pub const OVERLAY_NETWORK: &str = "io.kontena.container.overlay_network";
    /// Stack name.
    pub const STACK_NAME: &str = "io.kontena.stack.name";
    /// Grid name.
    pub const GRID_NAME: &str = "io.kontena.grid.name";
    /// Service name.
    pub const SERVICE_NAME: &str = "io.kontena.service.name";
    /// Instance number within the service.
    pub const INSTANCE_NUMBER: &str = "io.kontena.service.instance_number";
    /// Per-instance container name, e.g. `redis-2`.
    pub const CONTAINER_NAME: &str = "io.kontena.container.name";
    /// Marks a service's stack identity as reachable grid-wide.
    pub const EXPOSED: &str = "io.kontena.service.exposed";
}

/// Stack label value meaning "no stack".
pub const DEFAULT_STACK_SENTINEL: &str = "null";

/// Top-level DNS zone of the grid.
pub const TOP_DOMAIN: &str = "kontena.local";

/// Stack a container belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StackName {
    /// The unnamed default stack.
    #[default]
    Default,
    /// A named stack.
    Named(String),
}

impl StackName {
    /// Interpret a stack label; absent, empty and the sentinel all mean default.
    #[must_use]
    pub fn from_label(value: Option<&str>) -> Self {
        match value {
            None | Some("" | DEFAULT_STACK_SENTINEL) => Self::Default,
            Some(name) => Self::Named(name.to_string()),
        }
    }

    /// Whether this is the default stack.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Stack name, if named.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Named(name) => Some(name),
        }
    }
}

/// Grid metadata carried on a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerLabels {
    /// Stack.
    pub stack: StackName,
    /// Grid name.
    pub grid_name: Option<String>,
    /// Service name.
    pub service_name: Option<String>,
    /// Instance number within the service, as labelled.
    pub instance_number: Option<String>,
    /// Per-instance container name.
    pub container_name: Option<String>,
    /// Whether the service is exposed at grid scope.
    pub exposed: bool,
}

impl ContainerLabels {
    /// Extract typed labels from a raw label map.
    #[must_use]
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let text = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            stack: StackName::from_label(map.get(labels::STACK_NAME).map(|v| v.trim())),
            grid_name: text(labels::GRID_NAME),
            service_name: text(labels::SERVICE_NAME),
            instance_number: text(labels::INSTANCE_NUMBER),
            container_name: text(labels::CONTAINER_NAME),
            exposed: map.get(labels::EXPOSED).is_some_and(|v| is_truthy(v)),
        }
    }

    /// Parsed instance number, `None` when unlabelled.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidLabel`] if the label is not numeric.
    pub fn instance_number(&self) -> GridResult<Option<u32>> {
        self.instance_number
            .as_deref()
            .map(|v| {
                v.parse::<u32>().map_err(|_| GridError::InvalidLabel {
                    key: labels::INSTANCE_NUMBER,
                    value: v.to_string(),
                })
            })
            .transpose()
    }
}

/// Label truthiness: non-empty and not `0`/`false`.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Subset of the runtime's container config the agent reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerConfig {
    /// DNS domain, already scoped to the stack.
    pub domain_name: String,
    /// Hostname.
    pub host_name: String,
}

/// How an overlay address is carried on the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Separate bare `overlay_ip`, possibly under an older prefix length.
    Legacy,
    /// CIDR only.
    Current,
}

/// Overlay address derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayAddress {
    /// Bare address.
    pub ip: Ipv4Addr,
    /// Prefix length as recorded on the container.
    pub prefix_len: u8,
    /// Encoding.
    pub encoding: Encoding,
}

/// Runtime snapshot of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Container ID.
    pub id: ContainerId,
    /// Runtime name.
    pub name: String,
    /// Overlay address with prefix.
    pub overlay_cidr: Option<String>,
    /// Bare overlay address; present only on legacy encoded containers.
    pub overlay_ip: Option<String>,
    /// Prefix length text of the overlay address.
    pub overlay_suffix: Option<String>,
    /// Container config.
    pub config: ContainerConfig,
    /// Grid labels.
    pub labels: ContainerLabels,
}

impl Container {
    /// Create a bare snapshot with no overlay address and no labels.
    pub fn new(id: ContainerId) -> Self {
        Self {
            id,
            name: String::new(),
            overlay_cidr: None,
            overlay_ip: None,
            overlay_suffix: None,
            config: ContainerConfig::default(),
            labels: ContainerLabels::default(),
        }
    }

    /// Build a snapshot from what the runtime reports.
    ///
    /// Label values are kept as reported; problems with labels only used for
    /// DNS naming surface when the names are derived.
    ///
    /// A container with an overlay CIDR label but no overlay network label was
    /// created by an older agent and is treated as legacy encoded.
    #[must_use]
    pub fn from_runtime(
        id: ContainerId,
        name: impl Into<String>,
        config: ContainerConfig,
        raw_labels: &HashMap<String, String>,
    ) -> Self {
        let grid_labels = ContainerLabels::from_map(raw_labels);
        let mut container = Self::new(id).with_config(config).with_labels(grid_labels);
        container.name = name.into().trim_start_matches('/').to_string();

        if let Some(cidr) = raw_labels
            .get(labels::OVERLAY_CIDR)
            .filter(|c| !c.is_empty())
        {
            container = container.with_overlay_cidr(cidr.clone());
            if !raw_labels.contains_key(labels::OVERLAY_NETWORK) {
                if let Some((ip, _)) = cidr.split_once('/') {
                    container = container.with_overlay_ip(ip);
                }
            }
        }

        container
    }

    /// Set the runtime name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the overlay CIDR; the suffix follows it.
    #[must_use]
    pub fn with_overlay_cidr(mut self, cidr: impl Into<String>) -> Self {
        let cidr = cidr.into();
        self.overlay_suffix = cidr.split_once('/').map(|(_, s)| s.to_string());
        self.overlay_cidr = Some(cidr);
        self
    }

    /// Set the legacy bare overlay address.
    #[must_use]
    pub fn with_overlay_ip(mut self, ip: impl Into<String>) -> Self {
        self.overlay_ip = Some(ip.into());
        self
    }

    /// Set the container config.
    #[must_use]
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the grid labels.
    #[must_use]
    pub fn with_labels(mut self, labels: ContainerLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Whether the container has an overlay address at all.
    #[must_use]
    pub fn has_overlay(&self) -> bool {
        self.overlay_cidr.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Derive the overlay address, `None` when there is none.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidCidr`] when the recorded address does not parse.
    pub fn overlay_address(&self) -> GridResult<Option<OverlayAddress>> {
        let Some(cidr) = self.overlay_cidr.as_deref().filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        let parsed = OverlayCidr::parse(cidr)?;

        let address = match self.overlay_ip.as_deref() {
            Some(ip) => OverlayAddress {
                ip: ip.parse().map_err(|_| GridError::InvalidCidr {
                    value: ip.to_string(),
                })?,
                prefix_len: parsed.prefix_len,
                encoding: Encoding::Legacy,
            },
            None => OverlayAddress {
                ip: parsed.ip,
                prefix_len: parsed.prefix_len,
                encoding: Encoding::Current,
            },
        };

        Ok(Some(address))
    }

    /// DNS domain of the container.
    ///
    /// Uses the configured domain name, falling back to one derived from the
    /// stack and grid labels.
    #[must_use]
    pub fn domain(&self) -> Option<String> {
        if !self.config.domain_name.is_empty() {
            return Some(self.config.domain_name.clone());
        }
        let grid = self.labels.grid_name.as_deref()?;
        Some(match self.labels.stack.name() {
            None => format!("{grid}.{TOP_DOMAIN}"),
            Some(stack) => format!("{stack}.{grid}.{TOP_DOMAIN}"),
        })
    }
}

/// Resolves container IDs to fresh snapshots.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Fetch the current snapshot of container `id`.
    async fn get(&self, id: &ContainerId) -> GridResult<Container>;

    /// IDs of the containers currently running.
    async fn list(&self) -> GridResult<Vec<ContainerId>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ContainerId {
        ContainerId::new("12345").unwrap()
    }

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn stack_name_sentinel() {
        assert_eq!(StackName::from_label(None), StackName::Default);
        assert_eq!(StackName::from_label(Some("null")), StackName::Default);
        assert_eq!(StackName::from_label(Some("")), StackName::Default);
        assert_eq!(
            StackName::from_label(Some("custom")),
            StackName::Named("custom".to_string())
        );
    }

    #[test]
    fn truthiness() {
        for value in ["1", "true", "yes", "TRUE"] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["", " ", "0", "false", "False"] {
            assert!(!is_truthy(value), "{value:?}");
        }
    }

    #[test]
    fn labels_from_map() {
        let labels = ContainerLabels::from_map(&map(&[
            (labels::STACK_NAME, "custom"),
            (labels::GRID_NAME, "foo"),
            (labels::SERVICE_NAME, "redis"),
            (labels::INSTANCE_NUMBER, "2"),
            (labels::CONTAINER_NAME, "redis-2"),
            (labels::EXPOSED, "1"),
        ]));

        assert_eq!(labels.stack, StackName::Named("custom".to_string()));
        assert_eq!(labels.grid_name.as_deref(), Some("foo"));
        assert_eq!(labels.service_name.as_deref(), Some("redis"));
        assert_eq!(labels.instance_number().unwrap(), Some(2));
        assert_eq!(labels.container_name.as_deref(), Some("redis-2"));
        assert!(labels.exposed);
    }

    #[test]
    fn bad_instance_number_is_kept_raw() {
        let parsed = ContainerLabels::from_map(&map(&[(labels::INSTANCE_NUMBER, "two")]));
        assert_eq!(parsed.instance_number.as_deref(), Some("two"));
        assert!(matches!(
            parsed.instance_number(),
            Err(GridError::InvalidLabel {
                key: labels::INSTANCE_NUMBER,
                ..
            })
        ));
    }

    #[test]
    fn bad_instance_number_keeps_overlay() {
        let container = Container::from_runtime(
            id(),
            "redis-2",
            ContainerConfig::default(),
            &map(&[
                (labels::OVERLAY_CIDR, "10.81.128.1/16"),
                (labels::OVERLAY_NETWORK, "kontena"),
                (labels::INSTANCE_NUMBER, "two"),
            ]),
        );
        assert!(container.has_overlay());
    }

    #[test]
    fn current_encoding_from_runtime() {
        let container = Container::from_runtime(
            id(),
            "/redis-2",
            ContainerConfig::default(),
            &map(&[
                (labels::OVERLAY_CIDR, "10.81.128.1/16"),
                (labels::OVERLAY_NETWORK, "kontena"),
            ]),
        );

        assert_eq!(container.name, "redis-2");
        assert_eq!(container.overlay_ip, None);
        assert_eq!(container.overlay_suffix.as_deref(), Some("16"));
        let address = container.overlay_address().unwrap().unwrap();
        assert_eq!(address.encoding, Encoding::Current);
        assert_eq!(address.ip, Ipv4Addr::new(10, 81, 128, 1));
    }

    #[test]
    fn legacy_encoding_from_runtime() {
        let container = Container::from_runtime(
            id(),
            "redis-2",
            ContainerConfig::default(),
            &map(&[(labels::OVERLAY_CIDR, "10.81.1.1/19")]),
        );

        assert_eq!(container.overlay_ip.as_deref(), Some("10.81.1.1"));
        let address = container.overlay_address().unwrap().unwrap();
        assert_eq!(address.encoding, Encoding::Legacy);
        assert_eq!(address.prefix_len, 19);
    }

    #[test]
    fn no_overlay() {
        let container = Container::new(id());
        assert!(!container.has_overlay());
        assert_eq!(container.overlay_address().unwrap(), None);

        let empty = Container::new(id()).with_overlay_cidr("");
        assert!(!empty.has_overlay());
    }

    #[test]
    fn invalid_overlay() {
        let container = Container::new(id()).with_overlay_cidr("10.81.1.1");
        assert!(matches!(
            container.overlay_address(),
            Err(GridError::InvalidCidr { .. })
        ));
    }

    #[test]
    fn derived_domain() {
        let mut labels = ContainerLabels {
            grid_name: Some("foo".to_string()),
            ..ContainerLabels::default()
        };
        let container = Container::new(id()).with_labels(labels.clone());
        assert_eq!(container.domain().as_deref(), Some("foo.kontena.local"));

        labels.stack = StackName::Named("custom".to_string());
        let container = Container::new(id()).with_labels(labels);
        assert_eq!(
            container.domain().as_deref(),
            Some("custom.foo.kontena.local")
        );

        let configured = container.with_config(ContainerConfig {
            domain_name: "bar.kontena.local".to_string(),
            host_name: "redis-2".to_string(),
        });
        assert_eq!(configured.domain().as_deref(), Some("bar.kontena.local"));
    }
}
