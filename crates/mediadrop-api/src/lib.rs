//! Mediadrop API Library
//!
//! HTTP surface of the service: chunked upload ingest, the existence probe,
//! the media proxy and health, plus application setup.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;

pub use error::HttpAppError;
pub use mediadrop_infra::ErrorResponse;
