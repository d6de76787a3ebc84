use reqwest::Method;
use tracing::debug;

use crate::core::config::{PreparedRequest, RequestOptions};
use crate::core::response::{ByteStream, Reply, Response};
use crate::error::Result;
use crate::settings::{EnvSource, Settings};

/// GitLab API client.
///
/// Every call resolves its options from scratch: library defaults, then
/// `GITLAB_TOKEN`/`GITLAB_ENDPOINT`, then whatever the caller passes.
#[derive(Debug, Clone)]
pub struct Client {
    pub http_client: crate::core::client::Client,
    env: EnvSource,
}

impl Client {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http_client: crate::core::client::Client::new()?,
            env: EnvSource::Process,
        })
    }

    /// Uses a preconfigured reqwest client, e.g. one with a proxy or a
    /// default timeout.
    pub fn with_http_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client: crate::core::client::Client::with_http_client(http_client),
            env: EnvSource::Process,
        }
    }

    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    /// Merges defaults, environment and `options`, and resolves them against
    /// `path` without sending anything.
    pub fn prepare(&self, path: impl AsRef<str>, options: Option<RequestOptions>) -> Result<PreparedRequest> {
        let env = Settings::from_env(&self.env)?;

        RequestOptions::defaults()
            .merge(env.into())
            .merge(options.unwrap_or_default())
            .prepare(path.as_ref())
    }

    /// Sends a request. With `stream` set the reply is a byte stream,
    /// otherwise a buffered response.
    pub async fn request(&self, path: impl AsRef<str>, options: Option<RequestOptions>) -> Result<Reply> {
        let prepared = self.prepare(path, options)?;

        if prepared.stream {
            return Ok(Reply::Stream(self.http_client.stream(prepared)?));
        }

        Ok(Reply::Response(self.http_client.send(prepared).await?))
    }

    /// Streaming counterparts of the verb methods.
    pub fn stream(&self) -> Streaming<'_> {
        Streaming { client: self }
    }

    async fn send(&self, path: &str, mut options: RequestOptions) -> Result<Response> {
        options.stream = Some(false);

        let prepared = self.prepare(path, Some(options))?;
        debug!(method = %prepared.method, url = %prepared.url, "dispatching");

        self.http_client.send(prepared).await
    }

    fn open(&self, path: &str, mut options: RequestOptions) -> Result<ByteStream> {
        options.stream = Some(true);
        options.json = Some(false);

        self.http_client.stream(self.prepare(path, Some(options))?)
    }
}

/// Returned by [`Client::stream`].
#[derive(Debug, Clone, Copy)]
pub struct Streaming<'a> {
    client: &'a Client,
}

impl Streaming<'_> {
    /// Streams with the caller's method, `GET` when none is given.
    pub fn request(&self, path: impl AsRef<str>, options: Option<RequestOptions>) -> Result<ByteStream> {
        self.client.open(path.as_ref(), options.unwrap_or_default())
    }
}

macro_rules! verb_table {
    ($($verb:ident => $method:ident),+ $(,)?) => {
        impl Client {
            $(
                #[doc = concat!("Sends a `", stringify!($method), "` request and buffers the response.")]
                pub async fn $verb(&self, path: impl AsRef<str>, options: Option<RequestOptions>) -> Result<Response> {
                    let mut options = options.unwrap_or_default();
                    options.method = Some(Method::$method);

                    self.send(path.as_ref(), options).await
                }
            )+
        }

        impl Streaming<'_> {
            $(
                #[doc = concat!("Opens a `", stringify!($method), "` request as a raw byte stream.")]
                pub fn $verb(&self, path: impl AsRef<str>, options: Option<RequestOptions>) -> Result<ByteStream> {
                    let mut options = options.unwrap_or_default();
                    options.method = Some(Method::$method);

                    self.client.open(path.as_ref(), options)
                }
            )+
        }
    };
}

verb_table! {
    get => GET,
    post => POST,
    put => PUT,
    patch => PATCH,
    head => HEAD,
    delete => DELETE,
}
