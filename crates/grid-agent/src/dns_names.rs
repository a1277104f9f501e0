//! DNS names a container is discoverable under.
//!
//! Every container resolves under its stack-scoped domain by both its
//! instance name and its service name:
//!
//! ```text
//! redis-2.custom.foo.kontena.local
//! redis.custom.foo.kontena.local
//! ```
//!
//! Containers in the default stack additionally resolve at the top level
//! (`redis-2.kontena.local`, `redis.kontena.local`). Exposed services of a
//! named stack additionally resolve by stack name at grid scope
//! (`custom.foo.kontena.local`, `custom-2.foo.kontena.local`).

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use grid_common::{ContainerId, GridError, GridResult};

use crate::container::{Container, StackName, TOP_DOMAIN, labels};

/// A name to register for a container.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DnsName {
    /// Fully qualified name.
    pub name: String,
    /// Bare overlay address.
    pub ip: Ipv4Addr,
    /// Owning container.
    pub container_id: ContainerId,
}

/// Compute the names to register for `container`.
///
/// Returns an empty set when the container has no overlay address. The
/// result depends only on the snapshot, so recomputing it is idempotent.
///
/// # Errors
///
/// Fails when the overlay address does not parse, the container has no
/// domain, or a label the applicable rule needs is missing or malformed.
/// The instance number is only read for exposed services of a named stack.
pub fn dns_names(container: &Container) -> GridResult<BTreeSet<DnsName>> {
    let Some(address) = container.overlay_address()? else {
        return Ok(BTreeSet::new());
    };

    let require = |value: Option<&str>, key: &'static str| {
        value.map(str::to_string).ok_or_else(|| GridError::MissingLabel {
            id: container.id.to_string(),
            key,
        })
    };

    let domain = container.domain().ok_or_else(|| GridError::MissingDomain {
        id: container.id.to_string(),
    })?;
    let instance = require(
        container.labels.container_name.as_deref(),
        labels::CONTAINER_NAME,
    )?;
    let service = require(container.labels.service_name.as_deref(), labels::SERVICE_NAME)?;

    let mut names = vec![format!("{instance}.{domain}"), format!("{service}.{domain}")];

    match &container.labels.stack {
        StackName::Default => {
            names.push(format!("{instance}.{TOP_DOMAIN}"));
            names.push(format!("{service}.{TOP_DOMAIN}"));
        }
        StackName::Named(stack) if container.labels.exposed => {
            let grid = require(container.labels.grid_name.as_deref(), labels::GRID_NAME)?;
            let number = container
                .labels
                .instance_number()?
                .ok_or_else(|| GridError::MissingLabel {
                    id: container.id.to_string(),
                    key: labels::INSTANCE_NUMBER,
                })?;
            names.push(format!("{stack}.{grid}.{TOP_DOMAIN}"));
            names.push(format!("{stack}-{number}.{grid}.{TOP_DOMAIN}"));
        }
        StackName::Named(_) => {}
    }

    Ok(names
        .into_iter()
        .map(|name| DnsName {
            name,
            ip: address.ip,
            container_id: container.id.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::container::{ContainerConfig, ContainerLabels};

    fn redis(stack: StackName, domain: &str, exposed: bool) -> Container {
        Container::new(ContainerId::new("12345").unwrap())
            .with_overlay_cidr("10.81.1.1/16")
            .with_config(ContainerConfig {
                domain_name: domain.to_string(),
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

    fn names(container: &Container) -> Vec<String> {
        dns_names(container)
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect()
    }

    #[test]
    fn default_stack() {
        let container = redis(StackName::Default, "foo.kontena.local", false);
        assert_eq!(
            names(&container),
            [
                "redis-2.foo.kontena.local",
                "redis-2.kontena.local",
                "redis.foo.kontena.local",
                "redis.kontena.local",
            ]
        );
    }

    #[test]
    fn default_stack_ignores_exposed() {
        let container = redis(StackName::Default, "foo.kontena.local", true);
        assert_eq!(names(&container).len(), 4);
    }

    #[test]
    fn named_stack() {
        let container = redis(
            StackName::Named("custom".to_string()),
            "custom.foo.kontena.local",
            false,
        );
        assert_eq!(
            names(&container),
            [
                "redis-2.custom.foo.kontena.local",
                "redis.custom.foo.kontena.local",
            ]
        );
    }

    #[test]
    fn named_exposed_stack() {
        let container = redis(
            StackName::Named("custom".to_string()),
            "custom.foo.kontena.local",
            true,
        );
        assert_eq!(
            names(&container),
            [
                "custom-2.foo.kontena.local",
                "custom.foo.kontena.local",
                "redis-2.custom.foo.kontena.local",
                "redis.custom.foo.kontena.local",
            ]
        );
    }

    #[test]
    fn names_carry_bare_address() {
        let container = redis(StackName::Default, "foo.kontena.local", false)
            .with_overlay_cidr("10.81.1.1/19")
            .with_overlay_ip("10.81.1.1");
        for name in dns_names(&container).unwrap() {
            assert_eq!(name.ip, Ipv4Addr::new(10, 81, 1, 1));
            assert_eq!(name.container_id.as_str(), "12345");
        }
    }

    #[test]
    fn no_overlay_no_names() {
        let mut container = redis(StackName::Default, "foo.kontena.local", false);
        container.overlay_cidr = None;
        assert!(dns_names(&container).unwrap().is_empty());
    }

    #[test]
    fn missing_service_label() {
        let mut container = redis(StackName::Default, "foo.kontena.local", false);
        container.labels.service_name = None;
        assert!(matches!(
            dns_names(&container),
            Err(GridError::MissingLabel {
                key: labels::SERVICE_NAME,
                ..
            })
        ));
    }

    #[test]
    fn exposed_needs_instance_number() {
        let mut container = redis(
            StackName::Named("custom".to_string()),
            "custom.foo.kontena.local",
            true,
        );
        container.labels.instance_number = None;
        assert!(matches!(
            dns_names(&container),
            Err(GridError::MissingLabel {
                key: labels::INSTANCE_NUMBER,
                ..
            })
        ));
    }

    #[test]
    fn bad_instance_number_only_matters_when_exposed() {
        let mut container = redis(
            StackName::Named("custom".to_string()),
            "custom.foo.kontena.local",
            false,
        );
        container.labels.instance_number = Some("two".to_string());
        assert_eq!(names(&container).len(), 2);

        container.labels.exposed = true;
        assert!(matches!(
            dns_names(&container),
            Err(GridError::InvalidLabel {
                key: labels::INSTANCE_NUMBER,
                ..
            })
        ));
    }

    #[test]
    fn missing_domain() {
        let mut container = redis(StackName::Default, "", false);
        container.labels.grid_name = None;
        assert!(matches!(
            dns_names(&container),
            Err(GridError::MissingDomain { .. })
        ));
    }

    fn label() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,8}"
    }

    proptest! {
        #[test]
        fn cardinality_and_idempotence(
            stack in proptest::option::of(label()),
            grid in label(),
            service in label(),
            number in 1u32..100,
            exposed in any::<bool>(),
        ) {
            let container = Container::new(ContainerId::new("abc").unwrap())
                .with_overlay_cidr("10.81.0.7/16")
                .with_labels(ContainerLabels {
                    stack: StackName::from_label(stack.as_deref()),
                    grid_name: Some(grid),
                    container_name: Some(format!("{service}-{number}")),
                    service_name: Some(service),
                    instance_number: Some(number.to_string()),
                    exposed,
                });

            let first = dns_names(&container).unwrap();
            let expected = if container.labels.stack.is_default() || exposed { 4 } else { 2 };
            prop_assert_eq!(first.len(), expected);
            prop_assert_eq!(first, dns_names(&container).unwrap());
        }
    }
}
