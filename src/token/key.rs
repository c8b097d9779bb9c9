use std::fmt;
use std::sync::Arc;

use base64::Engine;

use crate::config::MIN_SECRET_BYTES;
use crate::error::SigningError;

/// Shared HMAC-SHA256 secret. Cheap to clone; never printed.
#[derive(Clone)]
pub struct SigningKey {
    bytes: Arc<[u8]>,
}

impl SigningKey {
    /// Decode a base64 (standard alphabet) secret. `None` or blank input is
    /// `MissingKey`; fewer than 32 decoded bytes is `KeyTooShort`.
    pub fn from_base64(secret_b64: Option<&str>) -> Result<Self, SigningError> {
        let secret = secret_b64
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SigningError::MissingKey)?;
        let bytes = base64::engine::general_purpose::STANDARD.decode(secret)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(SigningError::KeyTooShort {
                len: bytes.len(),
                min: MIN_SECRET_BYTES,
            });
        }
        Ok(Self {
            bytes: Arc::from(bytes),
        })
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<{} bytes>)", self.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_blank_secret() {
        assert!(matches!(
            SigningKey::from_base64(None),
            Err(SigningError::MissingKey)
        ));
        assert!(matches!(
            SigningKey::from_base64(Some("   ")),
            Err(SigningError::MissingKey)
        ));
    }

    #[test]
    fn test_malformed_and_short_secret() {
        assert!(matches!(
            SigningKey::from_base64(Some("not base64 !!")),
            Err(SigningError::InvalidKeyEncoding(_))
        ));
        // "c2hvcnQ=" is "short"
        assert!(matches!(
            SigningKey::from_base64(Some("c2hvcnQ=")),
            Err(SigningError::KeyTooShort { len: 5, min: 32 })
        ));
    }

    #[test]
    fn test_valid_secret() {
        let b64 = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        let key = SigningKey::from_base64(Some(&b64)).unwrap();
        assert_eq!(key.as_bytes(), &[7u8; 32]);
        assert_eq!(format!("{:?}", key), "SigningKey(<32 bytes>)");
    }
}
