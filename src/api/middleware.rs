//! API Middleware
//!
//! Request identity extraction and request logging. Authentication and fraud
//! scoring happen upstream; this layer only lifts their results out of the
//! headers and into request extensions.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::domain::{FraudMetadata, OperationContext};

pub const ACCOUNT_ID_HEADER: &str = "X-Account-Id";
pub const FRAUD_HEADER: &str = "X-Fraud-Detection";
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

/// Acting account, resolved by the upstream authentication layer
#[derive(Debug, Clone, Copy)]
pub struct RequestAccount {
    pub account_id: Uuid,
}

/// Fraud verdict attached by the upstream fraud detector
#[derive(Debug, Clone, Default)]
pub struct FraudVerdict(pub FraudMetadata);

fn reject(status: StatusCode, error: &str, error_code: &str) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "error_code": error_code,
            "retryable": false
        })),
    )
        .into_response()
}

// =========================================================================
// Request identity
// =========================================================================

/// Lift `X-Account-Id`, `X-Fraud-Detection` and `X-Correlation-Id` into
/// request extensions. A missing account header is left for the handler to
/// reject; a malformed one is rejected here.
pub async fn identity_middleware(
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let mut context = OperationContext::new();

    if let Some(raw) = headers.get(ACCOUNT_ID_HEADER) {
        let account_id = raw
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or_else(|| {
                reject(
                    StatusCode::BAD_REQUEST,
                    "Invalid X-Account-Id header format",
                    "invalid_account_id",
                )
            })?;
        request.extensions_mut().insert(RequestAccount { account_id });
        context = context.with_account(account_id);
    }

    let fraud = match headers.get(FRAUD_HEADER) {
        Some(raw) => raw
            .to_str()
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok())
            .map(FraudMetadata::new)
            .ok_or_else(|| {
                reject(
                    StatusCode::BAD_REQUEST,
                    "X-Fraud-Detection header must be a JSON document",
                    "invalid_fraud_metadata",
                )
            })?,
        None => FraudMetadata::none(),
    };
    request.extensions_mut().insert(FraudVerdict(fraud));

    if let Some(correlation_id) = correlation_id_from(&headers) {
        context = context.with_correlation_id(correlation_id);
    }
    context.ensure_correlation_id();
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

fn correlation_id_from(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-fraud-detection",
];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let correlation_id = correlation_id_from(request.headers());

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis();

    if status.is_server_error() {
        tracing::error!(method = %method, uri = %uri, status = %status, duration_ms, correlation_id = ?correlation_id, "Request failed");
    } else {
        tracing::info!(method = %method, uri = %uri, status = %status, duration_ms, correlation_id = ?correlation_id, "Request completed");
    }

    response
}
