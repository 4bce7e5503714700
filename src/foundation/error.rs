/// Result alias used across the crate.
pub type CompositorResult<T> = Result<T, CompositorError>;

/// Error taxonomy of the compositing pipeline.
///
/// Element- and resource-level variants are normally absorbed where they occur (logged, element or
/// track skipped). Request-level variants reach the host through [`crate::RenderRequest::finish`].
#[derive(thiserror::Error, Debug)]
pub enum CompositorError {
    /// A file or asset could not be opened or decoded.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A manifest color string could not be parsed.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// A manifest property is malformed or missing.
    #[error("invalid property: {0}")]
    InvalidProperty(String),

    /// The manifest/track model is missing, or a request could not be served at all.
    #[error("compositor unavailable: {0}")]
    CompositorUnavailable(String),

    /// The request was cancelled by the host.
    #[error("render request cancelled")]
    Cancelled,

    /// A source track could not be inserted into a composition.
    #[error("track insertion failed: {0}")]
    TrackInsertion(String),

    /// Manifest or configuration validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Frame sink or encoder failure.
    #[error("export error: {0}")]
    Export(String),

    /// Anything else, with context.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompositorError {
    /// Build a [`CompositorError::ResourceUnavailable`].
    pub fn resource_unavailable(msg: impl Into<String>) -> Self {
        Self::ResourceUnavailable(msg.into())
    }

    /// Build a [`CompositorError::InvalidColor`].
    pub fn invalid_color(msg: impl Into<String>) -> Self {
        Self::InvalidColor(msg.into())
    }

    /// Build a [`CompositorError::InvalidProperty`].
    pub fn invalid_property(msg: impl Into<String>) -> Self {
        Self::InvalidProperty(msg.into())
    }

    /// Build a [`CompositorError::CompositorUnavailable`].
    pub fn compositor_unavailable(msg: impl Into<String>) -> Self {
        Self::CompositorUnavailable(msg.into())
    }

    /// Build a [`CompositorError::TrackInsertion`].
    pub fn track_insertion(msg: impl Into<String>) -> Self {
        Self::TrackInsertion(msg.into())
    }

    /// Build a [`CompositorError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CompositorError::Export`].
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Return `true` for the cancellation variant.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
