//! Tower middleware for axum.
//!
//! The layer bridges host requests to the core's [`GateRequest`], runs
//! [`Gate::handle`], and either forwards to the inner service or renders the
//! gate's response:
//!
//! ```rust,ignore
//! use agentpayments_gate::{Gate, GateConfig, middleware::GateLayer};
//! use axum::{routing::get, Router};
//!
//! let gate = Gate::new(GateConfig::from_env()?)?;
//! let app = Router::new()
//!     .route("/data", get(handler))
//!     .layer(GateLayer::new(gate));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Request},
};
use bytes::Bytes;
use http::{Method, Response};
use tower::{Layer, Service};

use crate::gate::Gate;
use crate::request::{GateOutcome, GateRequest, GateResponse};
use crate::CHALLENGE_VERIFY_PATH;

/// Largest challenge-verification body the middleware will buffer. The form
/// fields together are bounded at ~2.3 KB, so this is generous headroom.
const CHALLENGE_BODY_LIMIT: usize = 16 * 1024;

/// Layer that installs the gate in front of a service.
#[derive(Clone)]
pub struct GateLayer {
    gate: Arc<Gate>,
}

impl GateLayer {
    /// Wrap a gate for use as a layer.
    pub fn new(gate: Gate) -> Self {
        Self { gate: Arc::new(gate) }
    }

    /// Share an existing gate, e.g. one also used for monitoring.
    pub fn from_shared(gate: Arc<Gate>) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for GateLayer {
    type Service = GateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// The middleware service produced by [`GateLayer`].
#[derive(Clone)]
pub struct GateService<S> {
    inner: S,
    gate: Arc<Gate>,
}

impl<S> Service<Request> for GateService<S>
where
    S: Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gate = self.gate.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (gate_req, req) = bridge_request(req).await;
            match gate.handle(&gate_req).await {
                GateOutcome::Passthrough => inner.call(req).await,
                GateOutcome::Respond(resp) => Ok(render_response(resp)),
            }
        })
    }
}

/// Translate a host request into the core's view of it.
///
/// The body is read only for POST `/__challenge/verify`, the one path where
/// the gate consumes it (and one the gate always answers itself). Everything
/// else passes through with its body untouched.
async fn bridge_request(req: Request) -> (GateRequest, Request) {
    let client_ip = client_ip_of(&req);
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let headers = req.headers().clone();

    let reads_body = method == Method::POST && path == CHALLENGE_VERIFY_PATH;
    let (body, req) = if reads_body {
        let (parts, body) = req.into_parts();
        let bytes = to_bytes(body, CHALLENGE_BODY_LIMIT)
            .await
            .unwrap_or_default();
        let req = Request::from_parts(parts, Body::from(bytes.clone()));
        (bytes, req)
    } else {
        (Bytes::new(), req)
    };

    let gate_req = GateRequest::new(method, path)
        .with_query(query)
        .with_headers(headers)
        .with_client_ip(client_ip)
        .with_body(body);
    (gate_req, req)
}

/// Client address: first `X-Forwarded-For` entry, else the socket peer, else
/// `"unknown"`.
fn client_ip_of(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    "unknown".to_string()
}

fn render_response(resp: GateResponse) -> Response<Body> {
    let (status, headers, body) = resp.into_parts();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
