use futures_util::{stream, TryStreamExt};
use serde_json::Value;
use tracing::info;

use super::config::PreparedRequest;
use super::response::{ByteStream, Response, ResponseBody};
use crate::error::{Error, Result};

/// Thin layer over `reqwest::Client` that turns a [`PreparedRequest`] into
/// either a buffered [`Response`] or a [`ByteStream`].
#[derive(Debug, Clone)]
pub struct Client {
    http_client: reqwest::Client,
}

impl Client {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder().build()?;

        Ok(Self { http_client })
    }

    pub fn with_http_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    fn build(&self, prepared: PreparedRequest) -> Result<reqwest::Request> {
        let PreparedRequest {
            method,
            url,
            headers,
            body,
            timeout,
            query,
            ..
        } = prepared;

        let mut builder = self.http_client.request(method, url).headers(headers);

        if !query.is_empty() {
            builder = builder.query(&query);
        }

        if let Some(body) = body {
            builder = builder.body(body);
        }

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(builder.build()?)
    }

    pub async fn send(&self, prepared: PreparedRequest) -> Result<Response> {
        let json = prepared.json;
        let request = self.build(prepared)?;

        info!("{} {}", request.method(), request.url());

        let response = self.http_client.execute(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let status_error = response.error_for_status_ref().err();
        let bytes = response.bytes().await?;

        if let Some(source) = status_error {
            return Err(Error::from_status(source, status, &bytes));
        }

        let body = if !json {
            ResponseBody::Raw(bytes)
        } else if bytes.iter().all(u8::is_ascii_whitespace) {
            ResponseBody::Json(Value::Null)
        } else {
            ResponseBody::Json(serde_json::from_slice(&bytes)?)
        };

        Ok(Response {
            status,
            headers,
            url,
            body,
        })
    }

    /// Nothing is sent until the stream is polled. Status codes are not
    /// inspected: an error response is streamed like any other body.
    pub fn stream(&self, prepared: PreparedRequest) -> Result<ByteStream> {
        let request = self.build(prepared)?;

        info!("{} {} (stream)", request.method(), request.url());

        let pending = self.http_client.execute(request);
        let bytes = stream::once(pending)
            .map_err(Error::from)
            .map_ok(|response| response.bytes_stream().map_err(Error::from))
            .try_flatten();

        Ok(Box::pin(bytes))
    }
}
