/// Result alias used across the crate.
pub type RenderResult<T> = Result<T, RenderError>;

/// Recoverable failures surfaced by image creation, decoding and backends.
///
/// Contract violations (locking twice, drawing outside a frame, out-of-range blend parameters)
/// are not represented here: they panic.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Pixel store or texture allocation failed.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// An image file was missing, unreadable or not a supported format.
    #[error("decode error: {0}")]
    Decode(String),

    /// A textual value (color string, config field) was malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The rendering device was lost; resources must be recreated.
    #[error("device lost: {0}")]
    DeviceLost(String),

    /// Any other backend/device failure.
    #[error("device error: {0}")]
    Device(String),

    /// Startup configuration was rejected.
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything else, keeping its source chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderError {
    /// Build an [`RenderError::Allocation`].
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build an [`RenderError::Decode`].
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build an [`RenderError::Parse`].
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Build an [`RenderError::DeviceLost`].
    pub fn device_lost(msg: impl Into<String>) -> Self {
        Self::DeviceLost(msg.into())
    }

    /// Build an [`RenderError::Device`].
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Build an [`RenderError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Return `true` when the error requires the device to be recreated.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::DeviceLost(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
