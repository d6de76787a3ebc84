//! GitLab API convenience wrapper around `reqwest`.
//!
//! Paths are resolved against `GITLAB_ENDPOINT` (default
//! `https://gitlab.com/api/v4/`), `GITLAB_TOKEN` is sent as `PRIVATE-TOKEN`,
//! JSON bodies are encoded and decoded, and GitLab error payloads surface as
//! [`Error::GitLab`].
//!
//! ```rust,no_run
//! # async fn run() -> glgot::Result<()> {
//! let client = glgot::Client::new()?;
//!
//! let user = client.get("users/979254", None).await?;
//! println!("{:?}", user.json());
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate derive_builder;

pub mod core;
pub mod error;
pub mod gitlab;
pub mod settings;

pub use crate::core::config::{AuthScheme, Body, RequestOptions, RequestOptionsBuilder};
pub use crate::core::response::{ByteStream, Reply, Response, ResponseBody};
pub use crate::error::{Error, Result};
pub use crate::gitlab::{Client, Streaming};
pub use crate::settings::{EnvSource, Settings};
