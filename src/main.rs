use anyhow::{Context, Result};
use clap::{Command, CommandFactory, Parser, ValueEnum};
use clap_complete::{generate, Generator, Shell};
use clap_verbosity_flag::Verbosity;
use colored_json::to_colored_json_auto;
use console::style;
use futures_util::TryStreamExt;
use glgot::{AuthScheme, Body, ByteStream, Client, EnvSource, RequestOptions, Response, ResponseBody, Settings};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_log::AsTrace;

#[derive(Debug, Parser)]
#[command(name = "glgot", author, version, about, long_about = None)] // Read from `Cargo.toml`
struct Cli {
    // If provided, outputs the completion file for given shell
    #[arg(long = "generate", value_enum)]
    generator: Option<Shell>,
    #[command(flatten)]
    verbose: Verbosity,
    #[arg(value_enum, required_unless_present = "generator")]
    method: Option<ArgMethod>,
    /// relative to the endpoint, or a full http(s) URL
    #[arg(required_unless_present = "generator")]
    path: Option<String>,
    /// overrides GITLAB_TOKEN and the config file
    #[arg(long)]
    token: Option<String>,
    /// overrides GITLAB_ENDPOINT and the config file
    #[arg(long, value_hint = clap::ValueHint::Url)]
    endpoint: Option<String>,
    #[arg(long, value_enum)]
    auth_scheme: Option<ArgAuthScheme>,
    /// "name: value", may be repeated
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,
    /// "key=value", may be repeated
    #[arg(long = "query", value_parser = parse_query)]
    query: Vec<(String, String)>,
    /// JSON is sent as JSON, anything else as is
    #[arg(short, long)]
    body: Option<String>,
    /// print the body without decoding it
    #[arg(long)]
    raw: bool,
    /// copy the body to stdout while it arrives
    #[arg(long)]
    stream: bool,
    /// seconds
    #[arg(long)]
    timeout: Option<u64>,
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ArgMethod {
    Get,
    Post,
    Put,
    Patch,
    Head,
    Delete,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ArgAuthScheme {
    PrivateToken,
    Authorization,
}

impl From<ArgAuthScheme> for AuthScheme {
    fn from(v: ArgAuthScheme) -> Self {
        match v {
            ArgAuthScheme::PrivateToken => AuthScheme::PrivateToken,
            ArgAuthScheme::Authorization => AuthScheme::Authorization,
        }
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected `name: value`, got `{s}`"))
}

fn parse_query(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected `key=value`, got `{s}`"))
}

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

impl Cli {
    fn options(&self, settings: Settings) -> RequestOptions {
        let body = self.body.as_deref().map(|raw| {
            serde_json::from_str::<serde_json::Value>(raw)
                .map(Body::Json)
                .unwrap_or_else(|_| Body::from(raw))
        });

        RequestOptions {
            token: self.token.clone().or(settings.token),
            endpoint: self.endpoint.clone().or(settings.endpoint),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
                .collect(),
            body,
            json: self.raw.then_some(false),
            auth_scheme: self.auth_scheme.map(AuthScheme::from),
            timeout: self.timeout.map(Duration::from_secs),
            query: self.query.clone(),
            ..RequestOptions::default()
        }
    }
}

async fn buffered(client: &Client, method: ArgMethod, path: &str, options: RequestOptions) -> glgot::Result<Response> {
    let options = Some(options);

    match method {
        ArgMethod::Get => client.get(path, options).await,
        ArgMethod::Post => client.post(path, options).await,
        ArgMethod::Put => client.put(path, options).await,
        ArgMethod::Patch => client.patch(path, options).await,
        ArgMethod::Head => client.head(path, options).await,
        ArgMethod::Delete => client.delete(path, options).await,
    }
}

fn streamed(client: &Client, method: ArgMethod, path: &str, options: RequestOptions) -> glgot::Result<ByteStream> {
    let options = Some(options);
    let stream = client.stream();

    match method {
        ArgMethod::Get => stream.get(path, options),
        ArgMethod::Post => stream.post(path, options),
        ArgMethod::Put => stream.put(path, options),
        ArgMethod::Patch => stream.patch(path, options),
        ArgMethod::Head => stream.head(path, options),
        ArgMethod::Delete => stream.delete(path, options),
    }
}

async fn run(cli: &Cli, method: ArgMethod, path: &str) -> Result<()> {
    let config_file = cli.config.clone().or_else(Settings::default_config_file);
    let settings = Settings::load(config_file.as_deref(), &EnvSource::Process)
        .context("unable to load settings")?;

    let client = Client::new()?;
    let options = cli.options(settings);
    let mut stdout = io::stdout().lock();

    if cli.stream {
        let mut bytes = streamed(&client, method, path, options)?;

        while let Some(chunk) = bytes.try_next().await? {
            stdout.write_all(&chunk)?;
        }

        return Ok(stdout.flush()?);
    }

    let response = buffered(&client, method, path, options).await?;

    eprintln!("{}", style(response.status).dim());

    match response.body {
        ResponseBody::Json(serde_json::Value::Null) => {}
        ResponseBody::Json(value) => {
            #[cfg(windows)]
            let _enabled = colored_json::enable_ansi_support();

            writeln!(stdout, "{}", to_colored_json_auto(&value)?)?;
        }
        ResponseBody::Raw(bytes) => stdout.write_all(&bytes)?,
    }

    Ok(stdout.flush()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbose.log_level_filter().as_trace())
        .with_writer(io::stderr)
        .init();

    if let Some(generator) = cli.generator {
        let mut cmd = Cli::command();
        eprintln!("Generating completion file for {generator:?}...");
        print_completions(generator, &mut cmd);

        return Ok(());
    }

    let (Some(method), Some(path)) = (cli.method, cli.path.as_deref()) else {
        anyhow::bail!("METHOD and PATH are required");
    };

    if let Err(err) = run(&cli, method, path).await {
        match err.downcast_ref::<glgot::Error>() {
            Some(gitlab_err) => eprintln!("{} {}", style(format!("{}:", gitlab_err.name())).red().bold(), gitlab_err),
            None => eprintln!("{} {err:#}", style("error:").red().bold()),
        }

        std::process::exit(1);
    }

    Ok(())
}
