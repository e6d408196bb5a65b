use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const LOG_TARGET: &str = "blogpit::http::response";

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request identifier shared with the response logger.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tag the request with a fresh id and echo it back as `x-request-id`.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

struct ResponseLog {
    method: Method,
    uri: Uri,
    request_id: String,
    started: Instant,
}

impl ResponseLog {
    fn emit(&self, response: &mut Response) {
        let status = response.status();
        let elapsed_ms = self.started.elapsed().as_millis();

        if !(status.is_client_error() || status.is_server_error()) {
            debug!(
                target: LOG_TARGET,
                status = status.as_u16(),
                method = %self.method,
                path = %self.uri.path(),
                elapsed_ms,
                request_id = %self.request_id,
                "request served",
            );
            return;
        }

        let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target: LOG_TARGET,
                status = status.as_u16(),
                method = %self.method,
                path = %self.uri.path(),
                query = self.uri.query().unwrap_or(""),
                elapsed_ms,
                source,
                detail = %detail,
                chain = ?messages,
                request_id = %self.request_id,
                "request failed",
            );
        } else {
            warn!(
                target: LOG_TARGET,
                status = status.as_u16(),
                method = %self.method,
                path = %self.uri.path(),
                query = self.uri.query().unwrap_or(""),
                elapsed_ms,
                source,
                detail = %detail,
                chain = ?messages,
                request_id = %self.request_id,
                "client request error",
            );
        }
    }
}

/// Log failed responses with the error chain their handler attached.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let log = ResponseLog {
        method: request.method().clone(),
        uri: request.uri().clone(),
        request_id: request
            .extensions()
            .get::<RequestContext>()
            .map(|ctx| ctx.request_id.clone())
            .unwrap_or_default(),
        started: Instant::now(),
    };

    let mut response = next.run(request).await;
    log.emit(&mut response);
    response
}
