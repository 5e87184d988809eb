//! Error module for the co-simulation interface layer.
use thiserror::Error;

/// Error types for the library.
#[derive(Debug, Error)]
pub enum CosimError {
    /// Data shape inconsistent with the declared buffer dimensions, or no data where some was expected.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    /// A population label could not be resolved in the spiking network registry.
    #[error("Unknown population: {0}")]
    UnknownPopulation(String),
    /// Error for I/O operations, e.g., while reading or writing a transport file.
    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),
    /// Error for corrupt or unsupported named-array archives.
    #[error("Archive error: {0}")]
    ArchiveError(String),
    /// A transform received data outside of its numeric domain, e.g., negative rates.
    #[error("Transform error: {0}")]
    TransformError(String),
    /// Error for invalid parameters.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    /// Error for an exchange requested out of the lock-step order.
    #[error("Phase violation: {0}")]
    PhaseViolation(String),
    /// The other end of a channel transport has been dropped.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
    /// Error while (de)serializing an interface configuration.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] serde_json::Error),
}

/// Convenience alias for results of the library.
pub type Result<T> = std::result::Result<T, CosimError>;
