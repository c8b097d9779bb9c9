use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use super::stats::{GatewayStats, StatsSnapshot};
use crate::config::GatewayConfig;
use crate::replay::ReplayGuard;
use crate::storage::{FileSystemStore, ObjectStore};
use crate::token::{SigningKey, TokenIssuer, TokenVerifier};

/// Request-independent settings applied by the handlers.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pub required_scope: String,
    pub token_ttl: Duration,
    pub replay_ttl: Duration,
    /// Principal stamped into tokens minted over HTTP.
    pub subject: String,
    pub allowed_origins: Vec<String>,
}

impl AccessPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            required_scope: config.required_scope.clone(),
            token_ttl: config.token_ttl(),
            replay_ttl: config.replay_ttl(),
            subject: config.subject.clone(),
            allowed_origins: config.allowed_origins.clone(),
        }
    }
}

/// Shared handler state. Every field is either immutable or internally
/// synchronized, so clones can be handed to any number of request tasks.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<TokenIssuer>,
    pub verifier: Arc<TokenVerifier>,
    pub replay: Arc<ReplayGuard>,
    pub store: Arc<dyn ObjectStore>,
    pub stats: Arc<GatewayStats>,
    pub policy: Arc<AccessPolicy>,
}

impl AppState {
    pub fn new(
        issuer: TokenIssuer,
        verifier: TokenVerifier,
        replay: Arc<ReplayGuard>,
        store: Arc<dyn ObjectStore>,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            issuer: Arc::new(issuer),
            verifier: Arc::new(verifier),
            replay,
            store,
            stats: Arc::new(GatewayStats::new()),
            policy: Arc::new(policy),
        }
    }

    /// Wire up the gateway from validated configuration. Fails fast on a
    /// missing or unusable secret and on a missing storage root.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let key = SigningKey::from_base64(config.secret_b64.as_deref())
            .context("loading token signing secret")?;
        let issuer = TokenIssuer::new(key.clone(), &config.issuer, &config.audience);
        let verifier = TokenVerifier::new(key, &config.issuer, &config.audience);
        let replay = Arc::new(ReplayGuard::new(config.replay_max_entries));
        let store = FileSystemStore::new(&config.storage_root).with_context(|| {
            format!("opening storage root {}", config.storage_root.display())
        })?;

        Ok(Self::new(
            issuer,
            verifier,
            replay,
            Arc::new(store),
            AccessPolicy::from_config(config),
        ))
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats
            .snapshot(self.store.open_streams(), self.replay.len())
    }
}
