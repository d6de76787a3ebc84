use std::collections::BTreeMap;
use std::time::Duration;

use colored_json::to_colored_json_auto;
use derive_more::Display;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::settings::Settings;

pub const DEFAULT_ENDPOINT: &str = "https://gitlab.com/api/v4/";
pub const DEFAULT_USER_AGENT: &str = concat!("glgot/", env!("CARGO_PKG_VERSION"));

/// How the token is presented to GitLab. The two are not interchangeable, so
/// a request uses exactly one of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum AuthScheme {
    /// `PRIVATE-TOKEN: <token>`, understood by API v4.
    #[default]
    #[display(fmt = "PRIVATE-TOKEN")]
    PrivateToken,

    /// `authorization: token <token>`
    #[display(fmt = "authorization")]
    Authorization,
}

impl AuthScheme {
    fn header(self, token: &str) -> Result<(HeaderName, HeaderValue)> {
        let (name, value) = match self {
            AuthScheme::PrivateToken => (HeaderName::from_static("private-token"), token.to_owned()),
            AuthScheme::Authorization => (header::AUTHORIZATION, format!("token {token}")),
        };

        let mut value = HeaderValue::from_str(&value).map_err(|e| Error::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        value.set_sensitive(true);

        Ok((name, value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Serialized as JSON and sent with a JSON content type.
    Json(Value),
    /// Sent untouched.
    Raw(Vec<u8>),
}

impl Body {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Raw(bytes)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Raw(text.into_bytes())
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Raw(text.as_bytes().to_vec())
    }
}

/// Per-call options. Every field is optional; unset fields fall back to the
/// environment and then to the library defaults.
///
/// `timeout` and `query` are handed to reqwest as they are.
#[derive(Debug, Clone, Default, Builder)]
#[builder(default, setter(into, strip_option))]
pub struct RequestOptions {
    pub token: Option<String>,
    /// Base URL for relative paths, `baseUrl` in other clients.
    pub endpoint: Option<String>,
    #[builder(setter(custom))]
    pub headers: BTreeMap<String, String>,
    pub body: Option<Body>,
    pub stream: Option<bool>,
    pub method: Option<Method>,
    pub json: Option<bool>,
    pub auth_scheme: Option<AuthScheme>,
    pub timeout: Option<Duration>,
    #[builder(setter(custom))]
    pub query: Vec<(String, String)>,
}

impl RequestOptionsBuilder {
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn query(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }
}

impl From<Settings> for RequestOptions {
    fn from(settings: Settings) -> Self {
        Self {
            token: settings.token,
            endpoint: settings.endpoint,
            ..Self::default()
        }
    }
}

/// Fully resolved request, ready for the transport.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub stream: bool,
    pub json: bool,
    pub timeout: Option<Duration>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn builder() -> RequestOptionsBuilder {
        RequestOptionsBuilder::default()
    }

    pub fn defaults() -> Self {
        Self {
            endpoint: Some(DEFAULT_ENDPOINT.to_owned()),
            headers: BTreeMap::from([("user-agent".to_owned(), DEFAULT_USER_AGENT.to_owned())]),
            stream: Some(false),
            method: Some(Method::GET),
            json: Some(true),
            auth_scheme: Some(AuthScheme::default()),
            ..Self::default()
        }
    }

    /// Layers `other` over `self`: set fields in `other` win, headers merge
    /// key by key (case-insensitively), query pairs are appended.
    pub fn merge(self, other: RequestOptions) -> RequestOptions {
        let headers = self
            .headers
            .into_iter()
            .chain(other.headers)
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        let mut query = self.query;
        query.extend(other.query);

        RequestOptions {
            token: other.token.or(self.token),
            endpoint: other.endpoint.or(self.endpoint),
            headers,
            body: other.body.or(self.body),
            stream: other.stream.or(self.stream),
            method: other.method.or(self.method),
            json: other.json.or(self.json),
            auth_scheme: other.auth_scheme.or(self.auth_scheme),
            timeout: other.timeout.or(self.timeout),
            query,
        }
    }

    /// Resolves the target URL and the final header set for `path`.
    pub fn prepare(self, path: &str) -> Result<PreparedRequest> {
        if path.is_empty() {
            return Err(Error::InvalidPath {
                path: String::new(),
                reason: "path is empty".to_owned(),
            });
        }

        let endpoint = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let url = resolve_url(path, endpoint)?;
        let method = self.method.unwrap_or(Method::GET);
        let stream = self.stream.unwrap_or(false);
        // stream consumers always get raw bytes
        let json = !stream && self.json.unwrap_or(true);

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        headers
            .entry(header::USER_AGENT)
            .or_insert(HeaderValue::from_static(DEFAULT_USER_AGENT));

        if json {
            headers
                .entry(header::ACCEPT)
                .or_insert(HeaderValue::from_static("application/json"));
        }

        if let Some(token) = self.token.as_deref().filter(|token| !token.is_empty()) {
            let (name, value) = self.auth_scheme.unwrap_or_default().header(token)?;
            headers.insert(name, value);
        }

        let body = match self.body {
            Some(Body::Json(value)) => {
                #[cfg(windows)]
                let _enabled = colored_json::enable_ansi_support();

                debug!("{method} {url}\n{}", to_colored_json_auto(&value)?);

                headers
                    .entry(header::CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static("application/json"));

                Some(serde_json::to_vec(&value)?)
            }
            Some(Body::Raw(bytes)) => Some(bytes),
            None => None,
        };

        if method == Method::PUT && body.is_none() {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        }

        Ok(PreparedRequest {
            method,
            url,
            headers,
            body,
            stream,
            json,
            timeout: self.timeout,
            query: self.query,
        })
    }
}

fn resolve_url(path: &str, endpoint: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(path) {
        if matches!(url.scheme(), "http" | "https") {
            return Ok(url);
        }
    }

    let joined = format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.strip_prefix('/').unwrap_or(path)
    );

    Url::parse(&joined).map_err(|e| Error::InvalidPath {
        path: path.to_owned(),
        reason: format!("`{joined}` is not a valid URL: {e}"),
    })
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let invalid = |reason: String| Error::InvalidHeader {
        name: name.to_owned(),
        reason,
    };

    let header_name = HeaderName::try_from(name).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;

    Ok((header_name, header_value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prepare(options: RequestOptions, path: &str) -> PreparedRequest {
        RequestOptions::defaults().merge(options).prepare(path).unwrap()
    }

    #[test]
    fn caller_wins_over_environment_and_defaults() {
        let env = RequestOptions::from(Settings {
            token: Some("MYTOKEN".into()),
            endpoint: Some("https://gitlab.example.com/api/v4/".into()),
        });
        let caller = RequestOptions::builder().token("MYOTHERTOKEN").build().unwrap();

        let merged = RequestOptions::defaults().merge(env).merge(caller);

        assert_eq!(merged.token.as_deref(), Some("MYOTHERTOKEN"));
        assert_eq!(merged.endpoint.as_deref(), Some("https://gitlab.example.com/api/v4/"));
        assert_eq!(merged.method, Some(Method::GET));
        assert_eq!(merged.json, Some(true));
    }

    #[test]
    fn headers_merge_case_insensitively() {
        let caller = RequestOptions::builder()
            .header("User-Agent", "my-agent")
            .header("X-Trace", "1")
            .build()
            .unwrap();

        let merged = RequestOptions::defaults().merge(caller);

        assert_eq!(merged.headers.len(), 2);
        assert_eq!(merged.headers["user-agent"], "my-agent");
        assert_eq!(merged.headers["x-trace"], "1");
    }

    #[test]
    fn relative_path_joins_endpoint_with_one_slash() {
        for endpoint in [
            "https://gitlab.example.com/api/v4",
            "https://gitlab.example.com/api/v4/",
            "https://gitlab.example.com/api/v4//",
        ] {
            let options = RequestOptions::builder().endpoint(endpoint).build().unwrap();

            for path in ["users/979254", "/users/979254"] {
                let request = prepare(options.clone(), path);
                assert_eq!(request.url.as_str(), "https://gitlab.example.com/api/v4/users/979254");
            }
        }
    }

    #[test]
    fn absolute_path_ignores_endpoint() {
        let options = RequestOptions::builder()
            .endpoint("https://gitlab.example.com/api/v4/")
            .build()
            .unwrap();

        let request = prepare(options, "https://www.gitlab.com/api/v4/users/979254");

        assert_eq!(request.url.as_str(), "https://www.gitlab.com/api/v4/users/979254");
    }

    #[test]
    fn default_endpoint_is_gitlab_com() {
        let request = prepare(RequestOptions::default(), "users/979254");

        assert_eq!(request.url.as_str(), "https://gitlab.com/api/v4/users/979254");
        assert_eq!(request.headers[header::USER_AGENT], DEFAULT_USER_AGENT);
        assert_eq!(request.headers[header::ACCEPT], "application/json");
    }

    #[test]
    fn empty_or_broken_path_is_rejected() {
        let err = RequestOptions::defaults().prepare("").unwrap_err();
        assert_eq!(err.name(), "TypeMismatch");

        let options = RequestOptions::builder().endpoint("not a url").build().unwrap();
        let err = RequestOptions::defaults().merge(options).prepare("users").unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn token_uses_selected_scheme() {
        let options = RequestOptions::builder().token("ABC").build().unwrap();
        let request = prepare(options, "user");
        assert_eq!(request.headers["private-token"], "ABC");
        assert!(!request.headers.contains_key(header::AUTHORIZATION));

        let options = RequestOptions::builder()
            .token("ABC")
            .auth_scheme(AuthScheme::Authorization)
            .build()
            .unwrap();
        let request = prepare(options, "user");
        assert_eq!(request.headers[header::AUTHORIZATION], "token ABC");
        assert!(!request.headers.contains_key("private-token"));
    }

    #[test]
    fn missing_or_empty_token_sends_no_auth() {
        let request = prepare(RequestOptions::default(), "user");
        assert!(!request.headers.contains_key("private-token"));

        let options = RequestOptions::builder().token("").build().unwrap();
        let request = prepare(options, "user");
        assert!(!request.headers.contains_key("private-token"));
    }

    #[test]
    fn json_body_is_encoded_with_content_type() {
        let options = RequestOptions::builder()
            .method(Method::POST)
            .body(json!({"test": [1, 3, 3, 7]}))
            .build()
            .unwrap();

        let request = prepare(options, "users");

        assert_eq!(request.body.as_deref(), Some(br#"{"test":[1,3,3,7]}"#.as_slice()));
        assert_eq!(request.headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn caller_content_type_is_kept() {
        let options = RequestOptions::builder()
            .method(Method::POST)
            .header("content-type", "application/merge-patch+json")
            .body(json!({"a": 1}))
            .build()
            .unwrap();

        let request = prepare(options, "users");

        assert_eq!(request.headers[header::CONTENT_TYPE], "application/merge-patch+json");
    }

    #[test]
    fn put_without_body_has_zero_length() {
        let options = RequestOptions::builder().method(Method::PUT).build().unwrap();
        let request = prepare(options, "projects/1");
        assert_eq!(request.headers[header::CONTENT_LENGTH], "0");

        let options = RequestOptions::builder()
            .method(Method::PUT)
            .body("name=glgot")
            .build()
            .unwrap();
        let request = prepare(options, "projects/1");
        assert!(!request.headers.contains_key(header::CONTENT_LENGTH));
    }

    #[test]
    fn stream_mode_turns_json_off() {
        let options = RequestOptions::builder().stream(true).build().unwrap();

        let request = prepare(options, "users/979254");

        assert!(request.stream);
        assert!(!request.json);
        assert!(!request.headers.contains_key(header::ACCEPT));
    }

    #[test]
    fn bad_header_name_is_rejected() {
        let options = RequestOptions::builder().header("bad header", "x").build().unwrap();

        let err = RequestOptions::defaults().merge(options).prepare("user").unwrap_err();

        assert!(matches!(err, Error::InvalidHeader { ref name, .. } if name == "bad header"));
    }
}
