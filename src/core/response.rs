use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::Result;

/// Raw response bytes exactly as the transport yields them.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Decoded body in JSON mode. An empty body decodes to `null`.
    Json(Value),
    Raw(Bytes),
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
    pub body: ResponseBody,
}

impl Response {
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Raw(_) => None,
        }
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.body {
            ResponseBody::Raw(bytes) => Some(bytes),
            ResponseBody::Json(_) => None,
        }
    }

    /// Deserializes the body into `T`, whichever mode it was fetched in.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match &self.body {
            ResponseBody::Json(value) => T::deserialize(value)?,
            ResponseBody::Raw(bytes) => serde_json::from_slice(bytes)?,
        };

        Ok(value)
    }
}

/// Outcome of [`Client::request`](crate::Client::request): a buffered
/// response, or a stream when the stream flag was set.
pub enum Reply {
    Response(Response),
    Stream(ByteStream),
}

impl Reply {
    pub fn into_response(self) -> Option<Response> {
        match self {
            Reply::Response(response) => Some(response),
            Reply::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<ByteStream> {
        match self {
            Reply::Stream(stream) => Some(stream),
            Reply::Response(_) => None,
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Response(response) => f.debug_tuple("Response").field(response).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}
