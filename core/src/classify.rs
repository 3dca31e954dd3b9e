//! Classification of failed API responses.
//!
//! See <https://developers.google.com/drive/v3/web/handle-errors> for the
//! error envelope and reason codes.

use reqwest::Response;
use reqwest::StatusCode;
use serde::Deserialize;

/// At most this many bytes of an error body are kept in memory.
pub const MAX_ERROR_BODY: usize = 1 << 20;

/// Unparseable bodies are quoted up to this many bytes.
const MAX_RAW_EXCERPT: usize = 1024;

/// Reasons that mark a failure as rate limiting regardless of status.
pub const RATE_LIMIT_REASONS: &[&str] = &[
    "userRateLimitExceeded",
    "rateLimitExceeded",
    "sharingRateLimitExceeded",
];

/// One entry of the envelope's `errors` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorDetail {
    pub domain: String,
    pub message: String,
    pub reason: String,
    pub location: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    error: EnvelopeError,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

/// A non-2xx response turned into something loggable and classifiable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The body carried the JSON error envelope with at least one sub-error.
    Structured {
        status: StatusCode,
        code: i64,
        message: String,
        errors: Vec<ErrorDetail>,
    },
    /// Anything else: the status line plus the start of the raw body.
    Unstructured { status: StatusCode, excerpt: String },
}

impl ApiError {
    /// Drain `response` and classify it.
    ///
    /// The whole body is consumed so the connection can be reused, but only
    /// the first [`MAX_ERROR_BODY`] bytes are retained.
    pub async fn read(response: Response) -> Self {
        let status = response.status();
        match read_capped(response, MAX_ERROR_BODY).await {
            Ok(body) => Self::from_body(status, &body),
            Err(err) => {
                tracing::debug!(%status, error = %err, "failed to read error body");
                Self::Unstructured {
                    status,
                    excerpt: String::new(),
                }
            }
        }
    }

    pub fn from_body(status: StatusCode, body: &[u8]) -> Self {
        match serde_json::from_slice::<Envelope>(body) {
            Ok(Envelope { error }) if !error.errors.is_empty() => Self::Structured {
                status,
                code: error.code,
                message: error.message,
                errors: error.errors,
            },
            _ => {
                let end = body.len().min(MAX_RAW_EXCERPT);
                Self::Unstructured {
                    status,
                    excerpt: String::from_utf8_lossy(&body[..end]).into_owned(),
                }
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Structured { status, .. } | Self::Unstructured { status, .. } => *status,
        }
    }

    /// Machine-readable reason codes, empty for unstructured bodies.
    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        let errors: &[ErrorDetail] = match self {
            Self::Structured { errors, .. } => errors,
            Self::Unstructured { .. } => &[],
        };
        errors.iter().map(|detail| detail.reason.as_str())
    }

    /// Server errors, 429, and the rate-limit reasons are transient.
    pub fn is_retriable(&self) -> bool {
        let status = self.status();
        if status.as_u16() >= 500 || status == StatusCode::TOO_MANY_REQUESTS {
            return true;
        }
        self.reasons()
            .any(|reason| RATE_LIMIT_REASONS.iter().any(|known| *known == reason))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structured {
                message, errors, ..
            } => {
                let joined = errors
                    .iter()
                    .map(|detail| detail.message.as_str())
                    .filter(|message| !message.is_empty())
                    .collect::<Vec<_>>()
                    .join("; ");
                if joined.is_empty() {
                    f.write_str(message)
                } else {
                    f.write_str(&joined)
                }
            }
            Self::Unstructured { status, excerpt } if excerpt.is_empty() => write!(f, "{status}"),
            Self::Unstructured { status, excerpt } => write!(f, "{status}: {excerpt}"),
        }
    }
}

impl std::error::Error for ApiError {}

async fn read_capped(mut response: Response, cap: usize) -> reqwest::Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = cap.saturating_sub(body.len());
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(body)
}
