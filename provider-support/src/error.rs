use std::fmt::{self, Display};

use reqwest::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;

/// How a failure should be understood by callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend could not be reached, or failed to serve the request.
    BackendUnavailable,
    /// The request was malformed. Usually caught before anything is sent.
    BadRequest,
    /// A lookup for a single entity found nothing.
    NotFound,
    /// A lookup which should have been unique matched several entities.
    AmbiguousResult,
    /// The backend understood the request but refused it, e.g. a ledger rule failed.
    Rejected,
    /// A bounded wait ran out of time.
    Timeout,
    /// A wait was cancelled by the caller.
    Cancelled,
    /// A backend response did not have the shape we expected.
    Decoding,
    /// A paginated query needed more pages than allowed.
    PaginationLimit,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BackendUnavailable => "backend unavailable",
            Self::BadRequest => "bad request",
            Self::NotFound => "not found",
            Self::AmbiguousResult => "ambiguous result",
            Self::Rejected => "rejected",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Decoding => "decoding error",
            Self::PaginationLimit => "pagination limit exceeded",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    kind: ErrorKind,
    message: String,
    fields: Map<String, Value>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: Map::new(),
        }
    }
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::decoding(format!("{err:#}"));
        }
        match err.status() {
            Some(StatusCode::BAD_REQUEST) => Self::bad_request(format!("{err:#}")),
            Some(StatusCode::NOT_FOUND) => Self::not_found(format!("{err:#}")),
            Some(status) => {
                Self::backend_unavailable(format!("{err:#}")).with_field("status", status.as_u16())
            }
            None => Self::backend_unavailable(format!("{err:#}")),
        }
    }
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendUnavailable, message)
    }
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AmbiguousResult, message)
    }
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decoding, message)
    }
    pub fn pagination_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PaginationLimit, message)
    }
    pub fn with_field(self, name: &str, value: impl Into<Value>) -> Self {
        let mut fields = self.fields;
        fields.insert(name.into(), value.into());
        Self { fields, ..self }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
    pub fn message(&self) -> &str {
        &self.message
    }
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(value: reqwest::Error) -> Self {
        Self::from_reqwest(value)
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(value: serde_json::Error) -> Self {
        Self::decoding(value.to_string())
    }
}

pub type ProviderResult<T, E = ProviderError> = std::result::Result<T, E>;

pub trait Context {
    fn context<C>(self, context: C) -> Self
    where
        C: Display;
}

impl<T> Context for ProviderResult<T> {
    fn context<C>(self, context: C) -> Self
    where
        C: Display,
    {
        self.map_err(|err| ProviderError {
            message: format!("{}: {}", context, err.message),
            ..err
        })
    }
}
