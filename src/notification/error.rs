//! Error types for channel construction and delivery.

use crate::core::ChannelKind;
use thiserror::Error;

/// The boxed cause carried by [`NotifyError`] variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// A channel is enabled but its settings are missing or invalid.
    #[error("invalid configuration for channel '{kind}': {source}")]
    Configuration {
        kind: ChannelKind,
        #[source]
        source: BoxError,
    },

    /// An enabled channel could not be initialized.
    #[error("failed to construct channel '{kind}': {source}")]
    ChannelConstruction {
        kind: ChannelKind,
        #[source]
        source: BoxError,
    },

    #[error("channel '{0}' is enabled but no factory is registered for it")]
    MissingFactory(ChannelKind),

    #[error("channel '{channel}' failed to deliver message: {source}")]
    Delivery {
        channel: String,
        #[source]
        source: BoxError,
    },

    #[error("channel '{channel}' failed to clean up: {source}")]
    Cleanup {
        channel: String,
        #[source]
        source: BoxError,
    },
}

impl NotifyError {
    pub fn configuration(kind: ChannelKind, source: impl Into<BoxError>) -> Self {
        Self::Configuration {
            kind,
            source: source.into(),
        }
    }

    pub fn construction(kind: ChannelKind, source: impl Into<BoxError>) -> Self {
        Self::ChannelConstruction {
            kind,
            source: source.into(),
        }
    }
}
