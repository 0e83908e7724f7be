//! Mediadrop Infrastructure Library
//!
//! Shared infrastructure for the Mediadrop binary:
//! - Middleware (request ID, security headers)
//! - Telemetry initialization
//! - The JSON error body returned by every failing endpoint

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{
    get_request_id, request_id_middleware, security_headers_middleware, RequestId,
    REQUEST_ID_HEADER,
};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};

pub use error::ErrorResponse;
