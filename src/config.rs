use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Scope every image fetch must carry.
pub const DEFAULT_REQUIRED_SCOPE: &str = "image:read";

/// Lifetime of tokens minted by the issuance endpoints (5 minutes).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 300;

/// How long a consumed token id stays in the replay registry (15 minutes).
pub const DEFAULT_REPLAY_TTL_SECS: u64 = 900;

/// Upper bound accepted for either TTL setting (30 days).
pub const MAX_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Soft upper bound on live replay records.
pub const DEFAULT_REPLAY_MAX_ENTRIES: usize = 1_000_000;

/// Interval between replay registry eviction sweeps.
pub const DEFAULT_REPLAY_SWEEP_INTERVAL_SECS: u64 = 60;

/// `iss` claim stamped into and expected on every token.
pub const DEFAULT_ISSUER: &str = "gallery-gate";

/// `aud` claim stamped into and expected on every token.
pub const DEFAULT_AUDIENCE: &str = "gallery";

/// Principal recorded as `sub` on tokens minted by the HTTP endpoints.
pub const DEFAULT_SUBJECT: &str = "user";

/// `Cache-Control` sent with every successful image response.
pub const IMAGE_CACHE_CONTROL: &str = "private, max-age=120";

/// Read buffer size used when streaming object bytes (64 KB).
pub const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// Minimum HMAC-SHA256 key length in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

const ENV_PREFIX: &str = "GALLERY_GATE_";

/// Top-level configuration for the gateway service.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Socket address the HTTP server binds to.
    pub listen_addr: String,
    /// Base64-encoded shared HMAC secret.
    pub secret_b64: Option<String>,
    /// Scope a token must carry to fetch an image.
    pub required_scope: String,
    /// Lifetime of issued tokens, in seconds.
    pub token_ttl_secs: u64,
    /// Lifetime of replay records, in seconds.
    pub replay_ttl_secs: u64,
    /// Maximum number of live replay records.
    pub replay_max_entries: usize,
    /// Seconds between replay eviction sweeps.
    pub replay_sweep_interval_secs: u64,
    /// Directory all image objects live under.
    pub storage_root: PathBuf,
    pub issuer: String,
    pub audience: String,
    pub subject: String,
    /// Origins allowed to call the gateway from a browser. Empty disables CORS.
    pub allowed_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            secret_b64: None,
            required_scope: DEFAULT_REQUIRED_SCOPE.to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            replay_ttl_secs: DEFAULT_REPLAY_TTL_SECS,
            replay_max_entries: DEFAULT_REPLAY_MAX_ENTRIES,
            replay_sweep_interval_secs: DEFAULT_REPLAY_SWEEP_INTERVAL_SECS,
            storage_root: PathBuf::new(),
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("secret_b64", &self.secret_b64.as_ref().map(|_| "<redacted>"))
            .field("required_scope", &self.required_scope)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("replay_ttl_secs", &self.replay_ttl_secs)
            .field("replay_max_entries", &self.replay_max_entries)
            .field("replay_sweep_interval_secs", &self.replay_sweep_interval_secs)
            .field("storage_root", &self.storage_root)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("subject", &self.subject)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

impl GatewayConfig {
    /// Load configuration: defaults, then the TOML file at `path` (if any),
    /// then `GALLERY_GATE_*` environment overrides. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = var("SECRET_B64") {
            self.secret_b64 = Some(v);
        }
        if let Some(v) = var("REQUIRED_SCOPE") {
            self.required_scope = v;
        }
        if let Some(v) = var("TOKEN_TTL_SECS") {
            self.token_ttl_secs = parse_env("TOKEN_TTL_SECS", &v)?;
        }
        if let Some(v) = var("REPLAY_TTL_SECS") {
            self.replay_ttl_secs = parse_env("REPLAY_TTL_SECS", &v)?;
        }
        if let Some(v) = var("REPLAY_MAX_ENTRIES") {
            self.replay_max_entries = parse_env("REPLAY_MAX_ENTRIES", &v)?;
        }
        if let Some(v) = var("REPLAY_SWEEP_INTERVAL_SECS") {
            self.replay_sweep_interval_secs = parse_env("REPLAY_SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = var("STORAGE_ROOT") {
            self.storage_root = PathBuf::from(v);
        }
        if let Some(v) = var("ALLOWED_ORIGINS") {
            self.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    /// Reject settings the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.token_ttl_secs == 0 {
            bail!("token_ttl_secs must be > 0");
        }
        if self.token_ttl_secs > MAX_TTL_SECS {
            bail!("token_ttl_secs must be <= {}", MAX_TTL_SECS);
        }
        if self.replay_ttl_secs == 0 {
            bail!("replay_ttl_secs must be > 0");
        }
        if self.replay_ttl_secs > MAX_TTL_SECS {
            bail!("replay_ttl_secs must be <= {}", MAX_TTL_SECS);
        }
        if self.replay_max_entries == 0 {
            bail!("replay_max_entries must be > 0");
        }
        if self.replay_sweep_interval_secs == 0 {
            bail!("replay_sweep_interval_secs must be > 0");
        }
        if self.required_scope.trim().is_empty() {
            bail!("required_scope must not be empty");
        }
        if self.storage_root.as_os_str().is_empty() {
            bail!("storage_root must be set");
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn replay_ttl(&self) -> Duration {
        Duration::from_secs(self.replay_ttl_secs)
    }

    pub fn replay_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.replay_sweep_interval_secs)
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("invalid {ENV_PREFIX}{name}={value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_fail_without_storage_root() {
        let err = GatewayConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("storage_root"));
    }

    #[test]
    fn test_toml_then_env_override() {
        let mut config = GatewayConfig::from_toml(
            r#"
            storage_root = "/srv/photos"
            token_ttl_secs = 120
            allowed_origins = ["http://localhost:5173"]
            "#,
        )
        .unwrap();
        assert_eq!(config.token_ttl_secs, 120);
        assert_eq!(config.replay_ttl_secs, DEFAULT_REPLAY_TTL_SECS);

        let env: HashMap<&str, &str> = [
            ("GALLERY_GATE_REPLAY_TTL_SECS", "30"),
            ("GALLERY_GATE_ALLOWED_ORIGINS", "http://a, http://b"),
        ]
        .into_iter()
        .collect();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.replay_ttl_secs, 30);
        assert_eq!(config.allowed_origins, vec!["http://a", "http://b"]);
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_env_number_is_an_error() {
        let mut config = GatewayConfig::default();
        let result = config.apply_env(|k| {
            (k == "GALLERY_GATE_TOKEN_TTL_SECS").then(|| "five".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_huge_ttls_rejected() {
        let base = GatewayConfig {
            storage_root: PathBuf::from("/srv/photos"),
            ..GatewayConfig::default()
        };
        let token = GatewayConfig {
            token_ttl_secs: u64::MAX,
            ..base.clone()
        };
        assert!(token.validate().unwrap_err().to_string().contains("token_ttl_secs"));
        let replay = GatewayConfig {
            replay_ttl_secs: MAX_TTL_SECS + 1,
            ..base.clone()
        };
        assert!(replay.validate().unwrap_err().to_string().contains("replay_ttl_secs"));
        let edge = GatewayConfig {
            token_ttl_secs: MAX_TTL_SECS,
            replay_ttl_secs: MAX_TTL_SECS,
            ..base
        };
        edge.validate().unwrap();
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = GatewayConfig {
            secret_b64: Some("c2VjcmV0".to_string()),
            ..GatewayConfig::default()
        };
        let text = format!("{:?}", config);
        assert!(!text.contains("c2VjcmV0"));
        assert!(text.contains("<redacted>"));
    }
}
