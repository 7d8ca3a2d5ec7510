//! HTTP relay server.
//!
//! hyper http1 accept loop with TokioIo; every request is forwarded to
//! the configured upstream with the resolved Authorization header, and
//! the upstream status and body pass through untouched.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;

/// Shared relay state.
pub struct AppState {
    pub args: Args,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(args: Args) -> Self {
        Self {
            args,
            client: reqwest::Client::new(),
        }
    }
}

/// Start the relay server.
pub async fn run(state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Relay listening on {}", state.args.listen);
    if state.args.api_key.is_some() {
        info!("Server-side API key configured; inbound credentials are ignored");
    } else {
        warn!("No server-side API key; relying on inbound Authorization headers");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Handle one inbound request.
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    info!("[{}] {} {}", addr, method, req.uri().path());

    // CORS preflight short-circuits before auth
    if method == Method::OPTIONS {
        return Ok(with_cors(preflight_response()));
    }

    let inbound_auth = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    let auth = match resolve_auth(state.args.api_key.as_deref(), inbound_auth.as_deref()) {
        Some(auth) => auth,
        None => {
            warn!("Missing Authorization header and server API key");
            return Ok(with_cors(unauthorized_response()));
        }
    };

    let body = req.collect().await?.to_bytes();

    Ok(with_cors(forward(&state, auth, body).await))
}

/// Resolve the outbound Authorization header. The server-side key always
/// wins; inbound credentials are used only when no key is configured.
pub fn resolve_auth(server_key: Option<&str>, inbound: Option<&str>) -> Option<String> {
    match server_key {
        Some(key) => Some(format!("Bearer {}", key)),
        None => inbound.map(|s| s.to_string()),
    }
}

/// Forward the request body to the upstream, passing status and body
/// through verbatim. The inbound Authorization header is not logged.
async fn forward(state: &AppState, auth: String, body: Bytes) -> Response<Full<Bytes>> {
    info!("Proxying request to {}", state.args.upstream_url);

    let result = state
        .client
        .post(&state.args.upstream_url)
        .header("Content-Type", "application/json")
        .header("Authorization", auth)
        .body(body)
        .send()
        .await;

    match result {
        Ok(upstream) => {
            let status = upstream.status();
            let payload = match upstream.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => return connection_failed_response(&e.to_string()),
            };

            if !status.is_success() {
                error!("Upstream API error: status={}", status);
            }

            Response::builder()
                .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY))
                .header("Content-Type", "application/json")
                .body(Full::new(payload))
                .unwrap_or_else(|_| connection_failed_response("invalid upstream response"))
        }
        Err(e) => {
            error!("Proxy internal error: {}", e);
            connection_failed_response(&e.to_string())
        }
    }
}

/// Apply the CORS header set to every response.
fn with_cors(mut response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Credentials", "true".parse().unwrap());
    headers.insert("Access-Control-Allow-Origin", "*".parse().unwrap());
    headers.insert(
        "Access-Control-Allow-Methods",
        "GET,OPTIONS,PATCH,DELETE,POST,PUT".parse().unwrap(),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, Content-Length, Content-MD5, Content-Type, Date, X-Api-Version, Authorization"
            .parse()
            .unwrap(),
    );
    response
}

fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn unauthorized_response() -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Unauthorized",
        "details": "Missing API Key"
    });

    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn connection_failed_response(details: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Internal Proxy Error",
        "details": details,
        "code": "PROXY_CONNECTION_FAILED"
    });

    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
