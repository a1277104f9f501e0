//! # grid-common
//!
//! Shared types for the grid agent crates:
//! - Validated container IDs
//! - Common error types

#![warn(missing_docs)]

pub mod error;
pub mod id;

pub use error::{GridError, GridResult};
pub use id::ContainerId;
