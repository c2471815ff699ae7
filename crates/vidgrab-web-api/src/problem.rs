use axum::http::StatusCode;
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde::ser::SerializeMap;
use serde_json::Value;
use std::borrow::Cow;
use vidgrab_core::{DownloadError, ErrorKind};

/// JSON error body: `status`, an `error` reason and any echoed limits.
#[derive(Debug)]
pub struct ProblemDetails {
    status: StatusCode,
    details: Vec<(Cow<'static, str>, Value)>,
}

impl Serialize for ProblemDetails {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.details.len() + 1))?;
        map.serialize_entry("status", &self.status.as_u16())?;
        for (k, v) in &self.details {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl ProblemDetails {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            details: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn with_error(self, reason: &str) -> Self {
        self.with_detail("error", reason)
    }

    pub fn with_detail(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.details.push((Cow::Borrowed(key), value.into()));
        self
    }
}

impl From<&DownloadError> for ProblemDetails {
    fn from(err: &DownloadError) -> Self {
        let status = match err.kind() {
            ErrorKind::ClientInput => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Server => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let problem = ProblemDetails::new(status).with_error(err.reason());

        match err {
            DownloadError::NoUrl | DownloadError::InvalidUrl => problem,
            DownloadError::RateLimited { limit, window } => problem
                .with_detail("limit", *limit as u64)
                .with_detail("window_seconds", window.as_secs()),
            DownloadError::DurationExceeded { limit, duration } => problem
                .with_detail("max_duration", *limit)
                .with_detail("duration", *duration),
            DownloadError::Unresolvable { detail } | DownloadError::DownloadFailed { detail } => {
                problem.with_detail("details", detail.as_str())
            }
            DownloadError::FetcherUnavailable(_) | DownloadError::Storage(_) => problem,
        }
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
