//! Route paths and multipart field names

pub const SERVICE_NAME: &str = "mediadrop";

pub const CHUNK_UPLOAD_PATH: &str = "/filedrop/uploads/chunk";
pub const FILE_EXISTS_PATH: &str = "/filedrop/uploads/exists";
pub const MEDIA_PROXY_PATH: &str = "/proxy/{*url}";
pub const HEALTH_PATH: &str = "/health";

/// Multipart field carrying the raw chunk bytes
pub const CHUNK_FIELD: &str = "chunk";
/// Multipart field carrying the JSON chunk metadata
pub const META_FIELD: &str = "meta";
