//! Common error types for the grid agent.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`GridError`].
pub type GridResult<T> = Result<T, GridError>;

/// Common errors across the grid agent crates.
#[derive(Error, Diagnostic, Debug)]
pub enum GridError {
    /// Container not found.
    #[error("Container not found: {id}")]
    #[diagnostic(code(grid::container::not_found))]
    ContainerNotFound {
        /// The container ID that was not found.
        id: String,
    },

    /// Invalid container ID format.
    #[error("Invalid container ID: {id}")]
    #[diagnostic(
        code(grid::container::invalid_id),
        help("Container IDs must be alphanumeric with hyphens and underscores, 1-64 characters")
    )]
    InvalidContainerId {
        /// The invalid container ID.
        id: String,
    },

    /// Lifecycle event without the fields needed to act on it.
    #[error("Malformed event: {reason}")]
    #[diagnostic(code(grid::event::malformed))]
    MalformedEvent {
        /// What was wrong with the event.
        reason: String,
    },

    /// Required container label is absent.
    #[error("Container {id} is missing label {key}")]
    #[diagnostic(code(grid::label::missing))]
    MissingLabel {
        /// The container ID.
        id: String,
        /// The label key.
        key: &'static str,
    },

    /// Container has neither a configured domain nor the labels to derive one.
    #[error("Container {id} has no DNS domain")]
    #[diagnostic(
        code(grid::container::no_domain),
        help("Set the container's domain name or its grid name label")
    )]
    MissingDomain {
        /// The container ID.
        id: String,
    },

    /// Container label carries a value that cannot be interpreted.
    #[error("Invalid value {value:?} for label {key}")]
    #[diagnostic(code(grid::label::invalid))]
    InvalidLabel {
        /// The label key.
        key: &'static str,
        /// The offending value.
        value: String,
    },

    /// Overlay address is not a valid IPv4 CIDR.
    #[error("Invalid overlay CIDR: {value}")]
    #[diagnostic(
        code(grid::overlay::invalid_cidr),
        help("Overlay addresses look like '10.81.1.1/16'")
    )]
    InvalidCidr {
        /// The invalid value.
        value: String,
    },

    /// Network adapter call failed.
    #[error("Network adapter {operation} failed: {message}")]
    #[diagnostic(code(grid::adapter::call))]
    AdapterCall {
        /// The adapter operation.
        operation: &'static str,
        /// The failure message.
        message: String,
    },

    /// Collaborator call did not finish in time.
    #[error("{operation} timed out after {seconds}s")]
    #[diagnostic(code(grid::timeout))]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The timeout bound in seconds.
        seconds: u64,
    },

    /// DNS registrar call failed.
    #[error("DNS registrar error: {message}")]
    #[diagnostic(code(grid::dns))]
    Dns {
        /// The failure message.
        message: String,
    },

    /// Container runtime call failed.
    #[error("Container runtime error: {message}")]
    #[diagnostic(code(grid::runtime))]
    Runtime {
        /// The failure message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(grid::io))]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(grid::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// Internal error (should not happen).
    #[error("Internal error: {message}")]
    #[diagnostic(code(grid::internal))]
    Internal {
        /// The error message.
        message: String,
    },
}
