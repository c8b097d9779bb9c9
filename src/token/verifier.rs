use std::sync::Arc;

use tracing::debug;

use super::claims::{Claims, ResourceId};
use super::clock::{Clock, SystemClock};
use super::codec;
use super::key::SigningKey;
use crate::error::{SigningError, VerifyError};

/// Validates presented tokens. Stateless apart from the immutable key, so it
/// can be shared across any number of request tasks.
#[derive(Clone)]
pub struct TokenVerifier {
    key: SigningKey,
    issuer: String,
    audience: String,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    pub fn new(key: SigningKey, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self::with_clock(key, issuer, audience, Arc::new(SystemClock))
    }

    pub fn with_clock(
        key: SigningKey,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key,
            issuer: issuer.into(),
            audience: audience.into(),
            clock,
        }
    }

    pub fn from_secret(
        secret_b64: Option<&str>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, SigningError> {
        Ok(Self::new(SigningKey::from_base64(secret_b64)?, issuer, audience))
    }

    /// Verify `token` for access to `expected` with `required_scope`.
    ///
    /// Checks run in order: structure and MAC, issuer/audience, time bounds,
    /// resource binding, scope membership. The first failure is returned.
    pub fn verify(
        &self,
        token: &str,
        expected: &ResourceId,
        required_scope: &str,
    ) -> Result<Claims, VerifyError> {
        let claims = codec::decode(token, &self.key)?;

        if claims.issuer() != self.issuer || claims.audience() != self.audience {
            return Err(reject(&claims, VerifyError::UntrustedIssuer));
        }

        let now = self.clock.now_unix();
        if now > claims.expires_at() {
            return Err(reject(&claims, VerifyError::Expired));
        }
        if let Some(nbf) = claims.not_before() {
            if now < nbf {
                return Err(reject(&claims, VerifyError::NotYetValid));
            }
        }

        if !claims.resource().authorizes(expected) {
            return Err(reject(&claims, VerifyError::WrongResource));
        }

        if !claims.scope().contains(required_scope) {
            return Err(reject(&claims, VerifyError::MissingScope));
        }

        Ok(claims)
    }

    pub fn now_unix(&self) -> i64 {
        self.clock.now_unix()
    }
}

fn reject(claims: &Claims, reason: VerifyError) -> VerifyError {
    debug!("token jti={} rejected: {}", claims.token_id(), reason);
    reason
}
