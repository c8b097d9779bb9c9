// gallery-gate binary: loads config (TOML file plus `GALLERY_GATE_*` overrides),
// starts the replay sweeper and serves until Ctrl-C.

use std::path::PathBuf;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gallery_gate::config::GatewayConfig;
use gallery_gate::logging::init_tracing;
use gallery_gate::server::{AppState, GatewayServer};

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!(
            "gallery-gate\n\nUSAGE:\n  gallery-gate [CONFIG.toml]\n\nENVIRONMENT:\n  GALLERY_GATE_LISTEN_ADDR          bind address (default 127.0.0.1:8080)\n  GALLERY_GATE_SECRET_B64           base64 HMAC secret, >= 32 bytes (required)\n  GALLERY_GATE_STORAGE_ROOT         image root directory (required)\n  GALLERY_GATE_REQUIRED_SCOPE       scope required to fetch (default image:read)\n  GALLERY_GATE_TOKEN_TTL_SECS       issued token lifetime (default 300)\n  GALLERY_GATE_REPLAY_TTL_SECS      replay record lifetime (default 900)\n  GALLERY_GATE_REPLAY_MAX_ENTRIES   replay registry bound (default 1000000)\n  GALLERY_GATE_REPLAY_SWEEP_INTERVAL_SECS  sweep interval (default 60)\n  GALLERY_GATE_ALLOWED_ORIGINS      comma-separated CORS origins\n  RUST_LOG                          tracing filter\n"
        );
        return Ok(());
    }

    init_tracing();

    let config_path = args.iter().find(|a| !a.starts_with('-')).map(PathBuf::from);
    let config = GatewayConfig::load(config_path.as_deref())?;
    info!(
        "gallery-gate starting: listen={} root={} scope={} token_ttl={}s replay_ttl={}s",
        config.listen_addr,
        config.storage_root.display(),
        config.required_scope,
        config.token_ttl_secs,
        config.replay_ttl_secs
    );

    let state = AppState::from_config(&config)?;

    let cancel = CancellationToken::new();
    let sweeper = state
        .replay
        .spawn_sweeper(config.replay_sweep_interval(), cancel.clone());

    let server = GatewayServer::start(state, &config.listen_addr).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    cancel.cancel();
    server.shutdown().await;
    let _ = sweeper.await;
    Ok(())
}
