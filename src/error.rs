use reqwest::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The request target could not be turned into a URL. Raised before any
    /// network activity.
    #[error("invalid request path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A caller header or the token cannot be sent as an HTTP header.
    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// GitLab answered with a non-success status and a JSON object body.
    #[error("{message} ({status})")]
    GitLab {
        message: String,
        status: u16,
        body: Value,
        #[source]
        source: reqwest::Error,
    },

    /// Anything the transport reports as-is, including status errors whose
    /// body is not a JSON object.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// JSON (de)serialization failed, e.g. a success body that is not JSON.
    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read settings: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Short kind name, stable across releases.
    pub fn name(&self) -> &'static str {
        match self {
            Error::InvalidPath { .. } | Error::InvalidHeader { .. } => "TypeMismatch",
            Error::GitLab { .. } => "GitLabError",
            Error::Transport(err) if err.is_status() => "HTTPError",
            Error::Transport(_) => "TransportError",
            Error::Decode(_) => "ParseError",
            Error::Config(_) => "ConfigError",
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::GitLab { status, .. } => StatusCode::from_u16(*status).ok(),
            Error::Transport(err) => err.status(),
            _ => None,
        }
    }

    /// Turns a status error into [`Error::GitLab`] when the response body is a
    /// JSON object, otherwise keeps the transport error untouched.
    pub(crate) fn from_status(source: reqwest::Error, status: StatusCode, body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => {
                let message = gitlab_message(&fields);
                debug!(status = status.as_u16(), %message, "GitLab error response");

                Error::GitLab {
                    message,
                    status: status.as_u16(),
                    body: Value::Object(fields),
                    source,
                }
            }
            _ => Error::Transport(source),
        }
    }
}

fn gitlab_message(fields: &Map<String, Value>) -> String {
    match fields.get("message") {
        None | Some(Value::Null | Value::Bool(false)) => Value::Object(fields.clone()).to_string(),
        Some(Value::String(message)) if message.is_empty() => Value::Object(fields.clone()).to_string(),
        Some(Value::String(message)) => message.clone(),
        // validation failures come back as `{"message": {"field": ["reason"]}}`
        Some(message) => message.to_string(),
    }
}
