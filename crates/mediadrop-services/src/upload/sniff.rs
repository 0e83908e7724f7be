//! Magic-byte content sniffing for the first chunk of an upload.

use mediadrop_core::AppError;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Number of leading bytes inspected.
pub const SNIFF_LEN: usize = 512;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Unsupported file type: {content_type} (allowed: {allowed:?})")]
    DisallowedContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Failed to read chunk: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::DisallowedContentType { .. } => {
                AppError::UnsupportedMediaType(err.to_string())
            }
            ValidationError::Io(e) => AppError::BadRequest(format!("Failed to read chunk: {}", e)),
        }
    }
}

/// Checks the leading bytes of a stream against an allow-list of MIME types
#[derive(Debug, Clone)]
pub struct ContentSniffer {
    allowed_content_types: Vec<String>,
}

impl ContentSniffer {
    pub fn new(allowed_content_types: Vec<String>) -> Self {
        Self {
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|ct| ct.to_lowercase())
                .collect(),
        }
    }

    /// Detect a MIME type from magic bytes.
    pub fn detect(head: &[u8]) -> &'static str {
        image::guess_format(head)
            .map(|format| format.to_mime_type())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
    }

    pub fn check(&self, head: &[u8]) -> Result<&'static str, ValidationError> {
        let content_type = Self::detect(head);
        if !self
            .allowed_content_types
            .iter()
            .any(|allowed| allowed == content_type)
        {
            return Err(ValidationError::DisallowedContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }
        Ok(content_type)
    }

    /// Read up to [`SNIFF_LEN`] bytes from `reader` and check them.
    ///
    /// Returns the bytes consumed so the caller can put them back in front of
    /// the rest of the stream.
    pub async fn sniff<R>(&self, reader: &mut R) -> Result<Vec<u8>, ValidationError>
    where
        R: AsyncRead + Unpin,
    {
        let mut head = Vec::with_capacity(SNIFF_LEN);
        reader.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
        let content_type = self.check(&head)?;
        tracing::debug!(content_type, sniffed_bytes = head.len(), "First chunk sniffed");
        Ok(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    fn sniffer() -> ContentSniffer {
        ContentSniffer::new(vec!["image/jpeg".to_string(), "IMAGE/PNG".to_string()])
    }

    #[test]
    fn test_detect_known_formats() {
        assert_eq!(ContentSniffer::detect(PNG_MAGIC), "image/png");
        assert_eq!(ContentSniffer::detect(JPEG_MAGIC), "image/jpeg");
        assert_eq!(
            ContentSniffer::detect(b"plain text"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_check_against_allow_list() {
        assert!(sniffer().check(PNG_MAGIC).is_ok());
        assert!(matches!(
            sniffer().check(b"%PDF-1.7"),
            Err(ValidationError::DisallowedContentType { .. })
        ));
        assert!(sniffer().check(b"").is_err());
    }

    #[tokio::test]
    async fn test_sniff_returns_consumed_prefix() {
        let mut payload = PNG_MAGIC.to_vec();
        payload.extend(std::iter::repeat(7u8).take(2000));
        let mut reader = &payload[..];

        let head = sniffer().sniff(&mut reader).await.unwrap();
        assert_eq!(head.len(), SNIFF_LEN);

        let mut rebuilt = head.clone();
        rebuilt.extend_from_slice(reader);
        assert_eq!(rebuilt, payload);
    }

    #[test]
    fn test_disallowed_maps_to_unsupported_media_type() {
        let err = sniffer().check(b"GIF89a").unwrap_err();
        assert!(matches!(
            AppError::from(err),
            AppError::UnsupportedMediaType(_)
        ));
    }
}
