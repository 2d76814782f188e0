use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::{IdKind, LookupSource};

/// Failure reported by (or about) an upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The upstream explicitly reported that no record exists, optionally
    /// with its own error code.
    #[error("not found: {message}")]
    NotFound {
        message: String,
        code: Option<String>,
    },
    /// The upstream did not answer within its time budget.
    #[error("upstream timeout: {0}")]
    Timeout(String),
    /// Non-success status, transport failure or malformed payload.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
    /// Portal markup no longer matches the expected selectors.
    #[error("portal structure changed: {0}")]
    StructuralChange(String),
}

impl UpstreamError {
    /// Stable identifier used in logs and response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::NotFound { .. } => "not_found",
            UpstreamError::Timeout(_) => "upstream_timeout",
            UpstreamError::UpstreamFailure(_) => "upstream_failure",
            UpstreamError::StructuralChange(_) => "structural_change",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            UpstreamError::NotFound { message: msg, .. }
            | UpstreamError::Timeout(msg)
            | UpstreamError::UpstreamFailure(msg)
            | UpstreamError::StructuralChange(msg) => msg,
        }
    }
}

impl UpstreamError {
    pub fn not_found(message: impl Into<String>) -> Self {
        UpstreamError::NotFound {
            message: message.into(),
            code: None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(err.to_string())
        } else {
            UpstreamError::UpstreamFailure(err.to_string())
        }
    }
}

/// Terminal failure states of one dispatched lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Identifier failed local validation or does not fit the requested source.
    #[error("invalid {}", .kind.label())]
    Invalid { kind: IdKind },
    /// The caller exhausted its request window.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    /// The source has no record for the identifier.
    #[error("not found: {message}")]
    NotFound {
        message: String,
        code: Option<String>,
    },
    /// Upstream timed out, failed, or changed its markup.
    #[error(transparent)]
    Upstream(UpstreamError),
}

/// HTTP-facing error: a lookup failure together with the endpoint's source,
/// which decides the body shape.
#[derive(Debug, Error)]
#[error("{endpoint_name}: {error}", endpoint_name = .endpoint.name())]
pub struct AppError {
    pub endpoint: LookupSource,
    pub error: LookupError,
}

impl AppError {
    pub fn new(endpoint: LookupSource, error: LookupError) -> Self {
        Self { endpoint, error }
    }

    fn failure_code(&self, upstream: &UpstreamError) -> &'static str {
        match upstream {
            UpstreamError::Timeout(_) => "upstream_timeout",
            UpstreamError::StructuralChange(_) => "structural_change",
            _ => match self.endpoint {
                LookupSource::RegistryApi => "internal_error",
                LookupSource::ThirdPartyApi => "external_api_error",
                LookupSource::PortalScrape => "scrape_error",
            },
        }
    }

    fn failure_message(&self) -> &'static str {
        match self.endpoint {
            LookupSource::RegistryApi => "Erro ao consultar CNPJ",
            LookupSource::ThirdPartyApi => "Erro interno na consulta externa",
            LookupSource::PortalScrape => "Falha ao realizar o scraping no site do CREA-MG.",
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each failure to the status code and body shape of its endpoint.
    fn into_response(self) -> Response {
        match &self.error {
            LookupError::Invalid { kind } => {
                let body = Json(json!({
                    "error": format!("{} inválido ou não fornecido.", kind.label()),
                    "code": kind.invalid_code(),
                }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            LookupError::RateLimited { retry_after_secs } => {
                let body = Json(json!({
                    "error": "Muitas tentativas. Tente novamente em alguns minutos.",
                    "code": "rate_limit_exceeded",
                    "retry_after": retry_after_secs,
                }));
                let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
                response
            }
            LookupError::NotFound { message, code } => {
                let body = match self.endpoint {
                    LookupSource::PortalScrape => Json(json!({
                        "message": "Profissional não encontrado no CREA-MG.",
                    })),
                    _ => Json(json!({
                        "error": message,
                        "code": code.as_deref().unwrap_or("not_found"),
                    })),
                };
                (StatusCode::NOT_FOUND, body).into_response()
            }
            LookupError::Upstream(upstream) => {
                let body = Json(json!({
                    "error": self.failure_message(),
                    "details": upstream.detail(),
                    "code": self.failure_code(upstream),
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
