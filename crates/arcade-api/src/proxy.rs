//! Player router.
//!
//! Forwards `/player/{id}/...` to the player's cabinet Service, keeping the
//! method, path, query, headers, and body. Each attempt opens a fresh HTTP/1
//! connection; transport failures are retried after a fixed delay, while
//! any response the cabinet sends (including errors) is passed through.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::header::{self, HeaderValue};
use axum::http::request::Parts;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use arcade_core::{ArcadeConfig, Naming, PlayerId};

/// Why one forwarding attempt failed.
#[derive(Debug, Error)]
enum ForwardError {
    #[error("connect: {0}")]
    Connect(#[from] std::io::Error),

    #[error("http: {0}")]
    Http(#[from] hyper::Error),

    #[error("upstream host {0:?} is not a valid header value")]
    Host(String),
}

/// Reverse proxy from the public router to per-player cabinets.
#[derive(Debug, Clone)]
pub struct PlayerProxy {
    naming: Naming,
    port: u16,
    upstream_suffix: String,
    attempts: u32,
    retry_delay: Duration,
    max_body_bytes: usize,
    connect_to: Option<SocketAddr>,
}

impl PlayerProxy {
    pub fn new(config: &ArcadeConfig) -> Self {
        Self {
            naming: config.naming(),
            port: config.cabinet.service_port,
            upstream_suffix: config.router.upstream_suffix.clone(),
            attempts: config.router.attempts.max(1),
            retry_delay: config.router.retry_delay(),
            max_body_bytes: config.router.max_body_bytes,
            connect_to: None,
        }
    }

    /// Dial `addr` for every player instead of resolving the Service name.
    /// The `Host` header still names the player's Service.
    pub fn connect_to(mut self, addr: SocketAddr) -> Self {
        self.connect_to = Some(addr);
        self
    }

    /// `{service}{suffix}` for `player`.
    pub fn upstream_host(&self, player: &PlayerId) -> String {
        format!("{}{}", self.naming.service_name(player), self.upstream_suffix)
    }

    /// Forward `req` to `player`'s cabinet, returning its response or 502
    /// once every attempt has failed.
    pub async fn forward(&self, player: &PlayerId, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let body = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(%player, error = %e, "player request body not forwarded");
                return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
            }
        };
        let host = self.upstream_host(player);

        for attempt in 1..=self.attempts {
            match self.send_once(&host, &parts, body.clone()).await {
                Ok(resp) => {
                    debug!(%player, attempt, status = %resp.status(), "player request forwarded");
                    return resp.map(Body::new);
                }
                Err(e) => {
                    warn!(%player, %host, attempt, error = %e, "player upstream request failed");
                    if attempt < self.attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        (
            StatusCode::BAD_GATEWAY,
            format!("player {player} is unreachable"),
        )
            .into_response()
    }

    async fn send_once(
        &self,
        host: &str,
        parts: &Parts,
        body: Bytes,
    ) -> Result<hyper::Response<Incoming>, ForwardError> {
        let stream = match self.connect_to {
            Some(addr) => TcpStream::connect(addr).await?,
            None => TcpStream::connect((host, self.port)).await?,
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "player upstream connection closed");
            }
        });

        let mut req = hyper::Request::new(Full::new(body));
        *req.method_mut() = parts.method.clone();
        *req.uri_mut() = parts
            .uri
            .path_and_query()
            .cloned()
            .map(Uri::from)
            .unwrap_or_else(|| Uri::from_static("/"));
        *req.headers_mut() = parts.headers.clone();
        let host_value =
            HeaderValue::from_str(host).map_err(|_| ForwardError::Host(host.to_string()))?;
        req.headers_mut().insert(header::HOST, host_value);

        Ok(sender.send_request(req).await?)
    }
}
