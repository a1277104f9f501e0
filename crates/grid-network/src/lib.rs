//! # grid-network
//!
//! Overlay network and DNS collaborators for the grid agent.
//!
//! This crate defines the boundaries the agent drives ([`NetworkAdapter`],
//! [`DnsRegistrar`]) together with their weave-backed implementations.

#![warn(missing_docs)]

pub mod adapter;
pub mod cidr;
pub mod dns;
pub mod image;
pub mod weave;

pub use adapter::NetworkAdapter;
pub use cidr::{CANONICAL_PREFIX_LEN, OverlayCidr};
pub use dns::{DnsRecord, DnsRegistrar, MemoryDns, WeaveDns};
pub use image::{ImageReference, ImageTag};
pub use weave::{WeaveAdapter, WeaveConfig};
