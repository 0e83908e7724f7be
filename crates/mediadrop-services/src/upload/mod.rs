pub mod coordinator;
pub mod sniff;

pub use coordinator::UploadCoordinator;
pub use sniff::{ContentSniffer, ValidationError};
