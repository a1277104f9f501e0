//! Lifecycle event definitions and bus.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use grid_common::{ContainerId, GridError, GridResult};

/// Inbound topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    /// The router's own lifecycle.
    RouterLifecycle,
    /// Container lifecycle as reported by the runtime.
    ContainerLifecycle,
}

impl Topic {
    /// Wire name of the topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RouterLifecycle => "router-lifecycle",
            Self::ContainerLifecycle => "container-lifecycle",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event as published, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Container ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Lifecycle action.
    #[serde(default)]
    pub status: Option<String>,
    /// Image reference of the container.
    #[serde(default)]
    pub from: Option<String>,
}

impl RawEvent {
    /// Build an event with id and status.
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            status: Some(status.into()),
            from: None,
        }
    }

    /// Set the image reference.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

/// Container lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStatus {
    /// Container started.
    Start,
    /// Container removed.
    Destroy,
    /// Container restarted.
    Restart,
    /// Any other action; ignored.
    Other(String),
}

impl From<&str> for EventStatus {
    fn from(status: &str) -> Self {
        match status {
            "start" => Self::Start,
            "destroy" => Self::Destroy,
            "restart" => Self::Restart,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Destroy => f.write_str("destroy"),
            Self::Restart => f.write_str("restart"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Validated container lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Container ID.
    pub id: ContainerId,
    /// Lifecycle status.
    pub status: EventStatus,
    /// Image reference, when the runtime reported one.
    pub from: Option<String>,
}

impl TryFrom<RawEvent> for LifecycleEvent {
    type Error = GridError;

    fn try_from(raw: RawEvent) -> GridResult<Self> {
        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GridError::MalformedEvent {
                reason: "missing id".to_string(),
            })?;
        let status = raw
            .status
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GridError::MalformedEvent {
                reason: format!("missing status for {id}"),
            })?;
        let id = ContainerId::new(id).map_err(|e| GridError::MalformedEvent {
            reason: e.to_string(),
        })?;

        Ok(Self {
            id,
            status: EventStatus::from(status.as_str()),
            from: raw.from.filter(|f| !f.is_empty()),
        })
    }
}

/// An event tagged with the topic it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Source topic.
    pub topic: Topic,
    /// The message.
    pub event: RawEvent,
}

impl Envelope {
    /// Envelope for the router topic.
    pub const fn router(event: RawEvent) -> Self {
        Self {
            topic: Topic::RouterLifecycle,
            event,
        }
    }

    /// Envelope for the container topic.
    pub const fn container(event: RawEvent) -> Self {
        Self {
            topic: Topic::ContainerLifecycle,
            event,
        }
    }
}

/// Event bus for lifecycle events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Envelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Default number of buffered events per subscriber.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Create a new event bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    /// Publish an event on `topic`.
    pub fn publish(&self, topic: Topic, event: RawEvent) {
        // Ignore SendError (no subscribers)
        let _ = self.sender.send(Envelope { topic, event });
    }
}
