use config::{Config, ConfigError, Environment, File, Map};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variables are read as `GITLAB_TOKEN` and `GITLAB_ENDPOINT`.
pub const ENV_PREFIX: &str = "GITLAB";

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub token: Option<String>,
    pub endpoint: Option<String>,
}

/// Where `GITLAB_*` variables come from.
///
/// `Fixed` lets tests hand in a variable map without touching the process
/// environment.
#[derive(Debug, Default, Clone)]
pub enum EnvSource {
    #[default]
    Process,
    Fixed(Map<String, String>),
}

impl EnvSource {
    pub fn fixed<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        EnvSource::Fixed(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Snapshot of the `GITLAB_*` variables. Process variables that are not
    /// valid UTF-8 are skipped rather than panicking in `std::env::vars`.
    fn vars(&self) -> Map<String, String> {
        match self {
            EnvSource::Process => std::env::vars_os()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
                .filter(|(key, _)| key.starts_with(ENV_PREFIX))
                .collect(),
            EnvSource::Fixed(vars) => vars.clone(),
        }
    }

    // empty variables count as unset, so `GITLAB_ENDPOINT=` falls back to the default
    fn environment(&self) -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .ignore_empty(true)
            .source(Some(self.vars()))
    }
}

impl Settings {
    /// Reads the environment. Called on every request, nothing is cached.
    pub fn from_env(env: &EnvSource) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(env.environment())
            .build()?
            .try_deserialize()
    }

    /// Config file first, environment on top of it.
    pub fn load(config_file: Option<&Path>, env: &EnvSource) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder
            .add_source(env.environment())
            .build()?
            .try_deserialize()
    }

    pub fn default_config_file() -> Option<PathBuf> {
        ProjectDirs::from("", "", "glgot").map(|dirs| dirs.config_dir().join("config.yaml"))
    }
}
