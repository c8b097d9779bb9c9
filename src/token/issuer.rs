use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::claims::{Claims, ResourceId, ScopeSet};
use super::clock::{Clock, SystemClock};
use super::codec;
use super::key::SigningKey;
use crate::error::SigningError;

/// Mints signed capability tokens. Holds only immutable state.
#[derive(Clone)]
pub struct TokenIssuer {
    key: SigningKey,
    issuer: String,
    audience: String,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
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

    /// Build an issuer from a base64 secret, failing if it is absent or unusable.
    pub fn from_secret(
        secret_b64: Option<&str>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, SigningError> {
        Ok(Self::new(SigningKey::from_base64(secret_b64)?, issuer, audience))
    }

    /// Issue a token for `subject` on `resource`, valid from now for `ttl`.
    pub fn issue(
        &self,
        subject: &str,
        resource: &ResourceId,
        scope: ScopeSet,
        ttl: Duration,
    ) -> Result<String, SigningError> {
        let claims = Claims::new(
            &self.issuer,
            &self.audience,
            subject,
            resource,
            scope,
            ttl,
            self.clock.now_unix(),
        )?;
        let token = codec::encode(&claims, &self.key)?;
        debug!(
            "issued token jti={} sub={} resource={} exp={}",
            claims.token_id(),
            claims.subject(),
            resource,
            claims.expires_at()
        );
        Ok(token)
    }
}
