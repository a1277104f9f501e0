//! # grid-agent
//!
//! Keeps a host's containers attached to the grid overlay network and
//! discoverable through DNS, driven by container and router lifecycle events.
//!
//! ## Flow
//!
//! ```text
//! runtime events ─▶ EventBus ─▶ Mailbox ─▶ OverlayWorker ─┬─▶ NetworkAdapter
//!                                              │           └─▶ DnsRegistrar
//!                                              └─▶ ContainerRuntime (snapshot per event)
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use grid_agent::docker::DockerRuntime;
//! use grid_agent::{EventBus, Mailbox, OverlayWorker};
//! use grid_network::{WeaveAdapter, WeaveConfig, WeaveDns};
//!
//! # async fn example() -> grid_common::GridResult<()> {
//! let weave = WeaveConfig::default();
//! let worker = OverlayWorker::new(
//!     Arc::new(WeaveAdapter::new(weave.clone())),
//!     Arc::new(DockerRuntime::connect().await?),
//!     Arc::new(WeaveDns::new(&weave)),
//! );
//!
//! let bus = EventBus::new();
//! let mailbox = Mailbox::spawn(Arc::new(worker), 1, 1024);
//! mailbox.forward(bus.subscribe()).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod container;
pub mod dns_names;
pub mod docker;
pub mod events;
pub mod mailbox;
pub mod worker;

pub use config::AgentConfig;
pub use container::{Container, ContainerRuntime};
pub use dns_names::{DnsName, dns_names};
pub use events::{Envelope, EventBus, EventStatus, LifecycleEvent, RawEvent, Topic};
pub use mailbox::Mailbox;
pub use worker::OverlayWorker;
