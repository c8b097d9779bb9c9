// Error taxonomy for issuance, verification, replay and storage.
//
// Each layer returns its own enum; the HTTP boundary folds them into
// `AccessError` and maps the category to a status code exactly once.

use std::io;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Rejected claim values at token construction time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token ttl must be at least one second")]
    NonPositiveTtl,
    #[error("scope set must not be empty")]
    EmptyScope,
    #[error("gallery id must not be empty")]
    EmptyGallery,
    #[error("image id must not be empty when present")]
    EmptyImage,
    #[error("subject must not be empty")]
    EmptySubject,
}

/// Failures while building a signer or minting a token.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signing secret is not configured")]
    MissingKey,
    #[error("signing secret is not valid base64: {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),
    #[error("signing secret is {len} bytes, at least {min} required")]
    KeyTooShort { len: usize, min: usize },
    #[error("signing key rejected by the MAC")]
    KeyRejected,
        #[error("invalid claims: {0}")]
    InvalidClaims(#[from] ClaimsError),
    #[error("failed to encode token: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Why a presented token was refused. Never sent to clients.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    #[error("no token presented")]
    MissingToken,
    #[error("malformed token or signature mismatch")]
    BadSignature,
    #[error("token issuer or audience not trusted")]
    UntrustedIssuer,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("token bound to a different resource")]
    WrongResource,
    #[error("token lacks the required scope")]
    MissingScope,
}

impl VerifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerifyError::MissingToken | VerifyError::BadSignature | VerifyError::UntrustedIssuer => {
                ErrorKind::Authentication
            }
            VerifyError::Expired
            | VerifyError::NotYetValid
            | VerifyError::WrongResource
            | VerifyError::MissingScope => ErrorKind::Authorization,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReplayError {
    #[error("token id already consumed")]
    Replayed,
    #[error("replay registry is full")]
    CapacityExhausted,
    #[error("replay record lifetime out of range")]
    TtlOutOfRange,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found")]
    NotFound,
    #[error("resource key escapes the storage root")]
    PathTraversal,
    #[error("storage i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("malformed range header: {0}")]
    Malformed(String),
    #[error("range not satisfiable for {total} byte object")]
    Unsatisfiable { total: u64 },
}

/// Failure of `ObjectStore::open`.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Range(#[from] RangeError),
}

/// Coarse category of an access failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    Replay,
    Storage,
    Range,
    Issuance,
}

/// Everything the HTTP boundary can fail with.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl From<OpenError> for AccessError {
    fn from(e: OpenError) -> Self {
        match e {
            OpenError::Storage(e) => AccessError::Storage(e),
            OpenError::Range(e) => AccessError::Range(e),
        }
    }
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Verify(e) => e.kind(),
            AccessError::Replay(_) => ErrorKind::Replay,
            AccessError::Storage(_) => ErrorKind::Storage,
            AccessError::Range(_) => ErrorKind::Range,
            AccessError::Signing(_) => ErrorKind::Issuance,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::Verify(_) | AccessError::Replay(_) => StatusCode::UNAUTHORIZED,
            AccessError::Storage(_) => StatusCode::NOT_FOUND,
            AccessError::Range(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            AccessError::Signing(SigningError::InvalidClaims(_)) => StatusCode::BAD_REQUEST,
            AccessError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            // Uniform body: clients must not learn which check failed.
            AccessError::Verify(_) | AccessError::Replay(_) => status.into_response(),
            AccessError::Range(RangeError::Unsatisfiable { total }) => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{}", total))],
            )
                .into_response(),
            AccessError::Signing(SigningError::InvalidClaims(e)) => {
                (status, e.to_string()).into_response()
            }
            _ => status.into_response(),
        }
    }
}
