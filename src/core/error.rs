//! Error types for configuration, device sessions and the top level

use super::session::SessionState;
use crate::hid::TransportError;
use thiserror::Error;

/// Missing or invalid identifiers and settings, caught before a session starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required vendor id (--vendor-id)")]
    MissingVendorId,

    #[error("missing required product id (--product-id)")]
    MissingProductId,

    #[error("invalid USB id '{0}': expected 1..=0xffff, decimal or 0x-prefixed hex")]
    InvalidId(String),

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to load configuration: {0:#}")]
    Load(#[source] anyhow::Error),
}

/// The device could not be opened; the session never becomes active
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("device {vendor_id:04x}:{product_id:04x} not found")]
    NotFound { vendor_id: u16, product_id: u16 },

    #[error("failed to open device {vendor_id:04x}:{product_id:04x}: {source}")]
    Transport {
        vendor_id: u16,
        product_id: u16,
        #[source]
        source: TransportError,
    },

    #[error("failed to initialize HID API: {0}")]
    Init(#[source] TransportError),

    #[error("cannot open a session in state {0}")]
    InvalidState(SessionState),
}

/// Forwarding a report failed; fatal to the session
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("session is not active (state {0})")]
    NotActive(SessionState),

    #[error("report write failed: {0}")]
    Transport(#[from] TransportError),
}

/// Heartbeat lifecycle misuse or failure
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("heartbeat requires an active session (state {0})")]
    NotActive(SessionState),

    #[error("heartbeat already running")]
    HeartbeatRunning,

    #[error("failed to spawn heartbeat thread: {0}")]
    HeartbeatSpawn(#[source] std::io::Error),
}

/// Anything that terminates the program with a failure status
#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl HubError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        2
    }
}
