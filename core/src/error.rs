//! Error types for the podcast API client.
//!
//! # Design
//! `ApiError` is a closed set of kinds. Callers are expected to react per
//! kind: back off on `RateLimit`, fix the key on `Authentication`, and so on.
//! Every variant produced from a received response keeps that response behind
//! an `Arc`, so the error can be cloned around and inspected without copying
//! the body. `SendError` describes a failed exchange where no response
//! arrived; it becomes the `source()` of `ApiError::Connection`.

use std::sync::Arc;

use thiserror::Error;

use crate::http::HttpResponse;

/// Errors returned by `Transport::execute` and every `PodcastClient` method.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No response was received: refused connection, DNS failure, timeout.
    #[error("failed to connect to Listen API: {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: SendError,
    },

    /// 404: the endpoint does not exist, or the podcast / episode does not.
    #[error("endpoint does not exist, or podcast / episode does not exist")]
    NotFound { response: Arc<HttpResponse> },

    /// 401: wrong API key, or the account is suspended.
    #[error("wrong api key or your account is suspended")]
    Authentication { response: Arc<HttpResponse> },

    /// 429: quota exhausted on the FREE plan, or too many requests too fast.
    #[error("rate limit exceeded: quota used up or too many requests")]
    RateLimit { response: Arc<HttpResponse> },

    /// 400, or parameters rejected before the request was sent.
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        response: Option<Arc<HttpResponse>>,
    },

    /// 5xx: unexpected error on the server side.
    #[error("server error (HTTP {})", .response.status)]
    Server { response: Arc<HttpResponse> },

    /// Any other 4xx status.
    #[error("unexpected HTTP status {status}")]
    Http {
        status: u16,
        response: Arc<HttpResponse>,
    },

    /// Anything else that went wrong during the call.
    #[error("unknown error: {message}")]
    Unknown {
        message: String,
        response: Option<Arc<HttpResponse>>,
    },
}

/// Discriminant of `ApiError`, convenient for matching and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    NotFound,
    Authentication,
    RateLimit,
    InvalidRequest,
    Server,
    Http,
    Unknown,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Connection { .. } => ErrorKind::Connection,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::Authentication { .. } => ErrorKind::Authentication,
            ApiError::RateLimit { .. } => ErrorKind::RateLimit,
            ApiError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Http { .. } => ErrorKind::Http,
            ApiError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// The response that triggered this error, if one was received.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            ApiError::Connection { .. } => None,
            ApiError::NotFound { response }
            | ApiError::Authentication { response }
            | ApiError::RateLimit { response }
            | ApiError::Server { response }
            | ApiError::Http { response, .. } => Some(response.as_ref()),
            ApiError::InvalidRequest { response, .. } | ApiError::Unknown { response, .. } => {
                response.as_deref()
            }
        }
    }

    /// HTTP status of the triggering response.
    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }

    /// Map an error status code to its error kind. Returns the response back
    /// when the status is not an error.
    pub fn from_status(response: HttpResponse) -> Result<HttpResponse, ApiError> {
        let status = response.status;
        if status < 400 {
            return Ok(response);
        }
        let response = Arc::new(response);
        Err(match status {
            404 => ApiError::NotFound { response },
            401 => ApiError::Authentication { response },
            429 => ApiError::RateLimit { response },
            400 => ApiError::InvalidRequest {
                message: "something wrong on your end (client side error), e.g., missing required parameters"
                    .to_string(),
                response: Some(response),
            },
            s if s >= 500 => ApiError::Server { response },
            _ => ApiError::Http { status, response },
        })
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidRequest {
            message: message.into(),
            response: None,
        }
    }
}

impl From<SendError> for ApiError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Other(message) => ApiError::Unknown {
                message,
                response: None,
            },
            source => ApiError::Connection {
                attempts: 1,
                source,
            },
        }
    }
}

/// Failure of a single HTTP exchange before any response arrived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The connection could not be established; nothing reached the server.
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// The connection broke mid-exchange.
    #[error("i/o error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl SendError {
    /// Whether the exchange may be attempted again for a request of the given
    /// idempotency. Failures to connect are always safe to retry.
    pub fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            SendError::Connect(_) => true,
            SendError::Timeout(_) | SendError::Io(_) => idempotent,
            SendError::Other(_) => false,
        }
    }
}

/// Errors raised while building a client or session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base url '{0}' cannot carry path segments")]
    OpaqueBaseUrl(String),

    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}
