//! Crate-level error type aggregating the per-layer taxonomies.

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::protocol::TaskError;
use crate::signaling::SignalingError;
use crate::transport::TransportError;
use crate::wire::DecodeError;

/// Any error this crate can surface.
#[derive(Debug, Error)]
pub enum MxpError {
    /// A byte sequence failed to decode as a frame
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An A2A payload failed to cross the frame bridge
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A signaling provider failed
    #[error(transparent)]
    Signaling(#[from] SignalingError),

    /// The peer transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A task mutation was rejected
    #[error(transparent)]
    Task(#[from] TaskError),

    /// JSON (de)serialization failed outside a more specific layer
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias over [`MxpError`].
pub type MxpResult<T> = Result<T, MxpError>;
