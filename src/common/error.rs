//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Device registry errors, surfaced to the control plane as typed failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Device with access token '{access_token}' is already registered")]
    DuplicateAccessToken { access_token: String },

    #[error("Device with EUI '{dev_eui}' is already registered")]
    DuplicateDevEui { dev_eui: String },

    #[error("No device with access token '{access_token}'")]
    NotFound { access_token: String },
}

/// Downlink enqueue errors (ChirpStack gRPC API).
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("Invalid API token: {0}")]
    InvalidToken(#[from] tonic::metadata::errors::InvalidMetadataValue),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Enqueue rejected: {0}")]
    Rpc(#[from] tonic::Status),
}

/// Uplink decode errors. Any of these drops the event; none are fatal.
#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("Malformed uplink envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("Uplink event carries no data field")]
    MissingData,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Malformed uplink frame: {0}")]
    Frame(#[source] serde_json::Error),
}
