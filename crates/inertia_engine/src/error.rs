//! Error types for the easing engine

use thiserror::Error;

/// Errors surfaced by constructors and setters
///
/// The integration loop itself has no recoverable runtime errors: once a
/// configuration is accepted, stepping is pure arithmetic. Everything here is
/// reported synchronously by the offending call, before any state changes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A parameter set that the integrator cannot run with
    /// (non-finite field, `mass <= 0`, or `dt <= 0`)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An out-of-range argument to a scheduler or history setter
    /// (capacity, publish interval, or tick rate below 1)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
