// Axum request handlers: token issuance and token-gated image delivery.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use super::state::AppState;
use super::stats::StatsSnapshot;
use crate::config::IMAGE_CACHE_CONTROL;
use crate::error::{AccessError, ErrorKind, RangeError, SigningError, VerifyError};
use crate::storage::ResourceKey;
use crate::token::{ResourceId, ScopeSet};

/// Running HTTP server handle.
pub struct GatewayServer {
    addr: SocketAddr,
    state: AppState,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl GatewayServer {
    /// Bind `addr` (use port 0 for an ephemeral port) and start serving.
    pub async fn start(state: AppState, addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = router(state.clone());

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!("gateway server error: {}", e);
            }
        });

        info!("gateway listening on http://{}", addr);

        Ok(Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// URL of the fetch endpoint for one image.
    pub fn url_for_image(&self, gallery_id: &str, image_id: &str) -> String {
        self.url(&format!("/img/{}/{}", gallery_id, image_id))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("gateway stopped");
    }
}

/// Build the gateway router over `state`.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.policy.allowed_origins);

    let mut app = Router::new()
        .route("/img/tokens", post(issue_tokens))
        .route("/img/{gallery_id}/{image_id}/token", post(issue_token))
        .route("/img/{gallery_id}/{image_id}", get(fetch_image))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors {
        app = app.layer(cors);
    }
    app
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::RANGE, header::CONTENT_TYPE])
            .expose_headers([header::CONTENT_RANGE, header::ACCEPT_RANGES, header::CONTENT_LENGTH])
            .max_age(Duration::from_secs(600)),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenBody {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub gallery_id: String,
    pub image_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub gallery_id: String,
    pub image_id: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn mint(state: &AppState, gallery_id: &str, image_id: &str) -> Result<String, SigningError> {
    let resource = ResourceId::image(gallery_id, image_id)?;
    let scope = ScopeSet::single(&state.policy.required_scope)?;
    state
        .issuer
        .issue(&state.policy.subject, &resource, scope, state.policy.token_ttl)
}

fn issuance_failed(state: &AppState, e: SigningError) -> AccessError {
    match &e {
        SigningError::InvalidClaims(reason) => debug!("token request rejected: {}", reason),
        other => error!("token issuance failed: {}", other),
    }
    state.stats.record_rejection(ErrorKind::Issuance);
    AccessError::Signing(e)
}

/// POST /img/{gallery_id}/{image_id}/token: mint a token bound to one image.
async fn issue_token(
    State(state): State<AppState>,
    Path((gallery_id, image_id)): Path<(String, String)>,
) -> Result<Json<TokenBody>, AccessError> {
    let token = mint(&state, &gallery_id, &image_id).map_err(|e| issuance_failed(&state, e))?;
    state.stats.record_issued(1);
    Ok(Json(TokenBody { token }))
}

/// POST /img/tokens: mint one token per requested image, all or nothing.
async fn issue_tokens(
    State(state): State<AppState>,
    Json(requests): Json<Vec<TokenRequest>>,
) -> Result<Json<Vec<TokenResponse>>, AccessError> {
    let mut tokens = Vec::with_capacity(requests.len());
    for req in requests {
        let token =
            mint(&state, &req.gallery_id, &req.image_id).map_err(|e| issuance_failed(&state, e))?;
        tokens.push(TokenResponse {
            gallery_id: req.gallery_id,
            image_id: req.image_id,
            token,
        });
    }
    state.stats.record_issued(tokens.len() as u64);
    debug!("issued {} tokens in batch", tokens.len());
    Ok(Json(tokens))
}

/// GET /img/{gallery_id}/{image_id}: verify, consume, then stream the image.
async fn fetch_image(
    State(state): State<AppState>,
    Path((gallery_id, image_id)): Path<(String, String)>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response {
    match serve_image(&state, &gallery_id, &image_id, query.token.as_deref(), &headers).await {
        Ok(resp) => {
            state.stats.record_granted();
            resp
        }
        Err(e) => {
            let kind = e.kind();
            match kind {
                ErrorKind::Storage | ErrorKind::Range => {
                    debug!("fetch {}/{} failed: {}", gallery_id, image_id, e)
                }
                _ => info!("fetch {}/{} denied ({:?}): {}", gallery_id, image_id, kind, e),
            }
            state.stats.record_rejection(kind);
            e.into_response()
        }
    }
}

async fn serve_image(
    state: &AppState,
    gallery_id: &str,
    image_id: &str,
    query_token: Option<&str>,
    headers: &HeaderMap,
) -> Result<Response, AccessError> {
    let token = extract_token(query_token, headers)?;
    let expected = ResourceId::image(gallery_id, image_id).map_err(|_| VerifyError::WrongResource)?;

    let claims = state
        .verifier
        .verify(token, &expected, &state.policy.required_scope)?;

    // The replay record must outlive the token itself.
    let remaining = Duration::from_secs(claims.remaining_secs(state.verifier.now_unix()));
    let replay_ttl = state.policy.replay_ttl.max(remaining);
    state.replay.try_record(claims.token_id(), replay_ttl)?;

    let range = match headers.get(header::RANGE) {
        Some(v) => Some(
            v.to_str()
                .map_err(|_| RangeError::Malformed("non-ascii range header".to_string()))?,
        ),
        None => None,
    };

    let key = ResourceKey::new(gallery_id, image_id);
    let object = state.store.open(&key, range).await?;

    let status = if object.partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let content_length = object.content_length();
    let content_range = object
        .range
        .filter(|_| object.partial)
        .map(|r| r.content_range());

    debug!(
        "serving {} jti={} status={} bytes={}",
        key,
        claims.token_id(),
        status.as_u16(),
        content_length
    );

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, object.media_type.content_type())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, IMAGE_CACHE_CONTROL)
        .header(header::CONTENT_LENGTH, content_length);
    if let Some(content_range) = content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    // The stream (and its file handle) is dropped when the body completes,
    // errors, or the client goes away. Token expiry mid-transfer does not
    // cut an open stream short.
    let stats = state.stats.clone();
    let stream = object.stream.inspect(move |chunk| {
        if let Ok(bytes) = chunk {
            stats.record_served(bytes.len() as u64);
        }
    });

    Ok(builder.body(Body::from_stream(stream)).unwrap_or_else(|e| {
        error!("failed to build image response: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }))
}

/// Token from the `token` query parameter, else from `Authorization: Bearer`.
fn extract_token<'a>(
    query_token: Option<&'a str>,
    headers: &'a HeaderMap,
) -> Result<&'a str, VerifyError> {
    if let Some(token) = query_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token);
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(VerifyError::MissingToken)
}

/// GET /healthz: live counters.
async fn healthz(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.snapshot())
}
