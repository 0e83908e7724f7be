pub mod chunked_upload;
pub mod file_exists;
pub mod health;
pub mod media_proxy;
