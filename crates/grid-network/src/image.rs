//! Image reference parsing.

use grid_common::{GridError, GridResult};

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname.
    pub registry: String,
    /// Repository name.
    pub repository: String,
    /// Tag or digest.
    pub reference: ImageTag,
}

/// Image tag or digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTag {
    /// A tag (e.g., "latest").
    Tag(String),
    /// A digest (e.g., "sha256:abc123...").
    Digest(String),
}

impl ImageReference {
    /// Default registry.
    pub const DEFAULT_REGISTRY: &'static str = "docker.io";
    /// Default tag.
    pub const DEFAULT_TAG: &'static str = "latest";

    /// Parse an image reference string.
    ///
    /// Examples:
    /// - `weaveworks/weave` -> docker.io/weaveworks/weave:latest
    /// - `weaveworks/weave:1.4.5` -> docker.io/weaveworks/weave:1.4.5
    /// - `alpine` -> docker.io/library/alpine:latest
    /// - `localhost:5000/weave:2.0` -> localhost:5000/weave:2.0
    pub fn parse(reference: &str) -> GridResult<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(GridError::Config {
                message: "empty image reference".to_string(),
            });
        }

        let (name, tag) = if let Some((name, digest)) = reference.split_once('@') {
            (name, ImageTag::Digest(digest.to_string()))
        } else if let Some(idx) = reference.rfind(':') {
            // registry:port/image has no tag
            let potential_tag = &reference[idx + 1..];
            if potential_tag.contains('/') {
                (reference, ImageTag::Tag(Self::DEFAULT_TAG.to_string()))
            } else {
                (&reference[..idx], ImageTag::Tag(potential_tag.to_string()))
            }
        } else {
            (reference, ImageTag::Tag(Self::DEFAULT_TAG.to_string()))
        };

        let (registry, repository) = match name.split_once('/') {
            Some((host, rest))
                if host.contains('.') || host.contains(':') || host == "localhost" =>
            {
                (host.to_string(), rest.to_string())
            }
            Some(_) => (Self::DEFAULT_REGISTRY.to_string(), name.to_string()),
            None => (
                Self::DEFAULT_REGISTRY.to_string(),
                format!("library/{name}"),
            ),
        };

        Ok(Self {
            registry,
            repository,
            reference: tag,
        })
    }

    /// Whether this image is built from `repository`, ignoring tag and digest.
    ///
    /// `repository` is normalized the same way as a parsed reference, so
    /// `weaveworks/weave` matches `docker.io/weaveworks/weave:1.4.5`.
    #[must_use]
    pub fn is_repository(&self, repository: &str) -> bool {
        Self::parse(repository)
            .map(|other| other.registry == self.registry && other.repository == self.repository)
            .unwrap_or(false)
    }
}
