//! Overlay network adapter boundary.

use async_trait::async_trait;
use grid_common::{ContainerId, GridResult};

/// Driver that provides the overlay network on this host.
///
/// The adapter owns its readiness flag; callers query it per event and never
/// cache it.
#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    /// Whether the driver is ready to attach containers.
    fn running(&self) -> bool;

    /// Whether `image` is the router's own container image.
    fn is_router_image(&self, image: &str) -> bool;

    /// (Re)initialize the driver.
    async fn start(&self) -> GridResult<()>;

    /// Attach a container at `cidr`, used verbatim.
    async fn attach_container(&self, id: &ContainerId, cidr: &str) -> GridResult<()>;

    /// Move a legacy container onto `cidr`, dropping whatever it had before.
    async fn migrate_container(&self, id: &ContainerId, cidr: &str) -> GridResult<()>;
}
