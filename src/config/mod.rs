//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{fmt, net::SocketAddr, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "apod-relay";
const ENV_PREFIX: &str = "APOD_RELAY";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BASE_PATH: &str = "/api/apod";
const DEFAULT_UPSTREAM_URL: &str = "https://api.nasa.gov/planetary/apod";
const DEFAULT_UPSTREAM_API_KEY: &str = "DEMO_KEY";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 21_600;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 50;
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_RECENT_CONCURRENCY: usize = 1;


/// Command-line arguments for the apod-relay binary.
#[derive(Debug, Parser)]
#[command(
    name = "apod-relay",
    version,
    about = "Caching relay for the NASA Astronomy Picture of the Day API"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "APOD_RELAY_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Fetch one record through the cache and print it as JSON.
    Fetch(FetchArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct UpstreamOverrides {
    /// Override the upstream API key.
    #[arg(long = "upstream-api-key", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Override the upstream endpoint URL.
    #[arg(long = "upstream-base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Override the per-request upstream timeout.
    #[arg(long = "upstream-timeout-seconds", value_name = "SECONDS")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub upstream: UpstreamOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the path prefix the routes are mounted under.
    #[arg(long = "server-base-path", value_name = "PATH")]
    pub server_base_path: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the cache entry lifetime.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the maximum number of cached records.
    #[arg(long = "cache-max-entries", value_name = "COUNT")]
    pub cache_max_entries: Option<usize>,

    /// Override the comma-separated list of allowed CORS origins.
    #[arg(long = "cors-allowed-origins", value_name = "ORIGINS")]
    pub cors_allowed_origins: Option<String>,

    /// Override how many dates a `recent` request may fetch concurrently.
    #[arg(long = "recent-concurrency", value_name = "COUNT")]
    pub recent_concurrency: Option<usize>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct FetchArgs {
    #[command(flatten)]
    pub upstream: UpstreamOverrides,

    /// Date to fetch (YYYY-MM-DD); omit for today's record.
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub upstream: UpstreamSettings,
    pub cache: CacheSettings,
    pub cors: CorsSettings,
    pub recent: RecentSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    /// Normalized mount prefix: empty, or `/segment[/segment...]` without a trailing slash.
    pub base_path: String,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Clone)]
pub struct UpstreamSettings {
    pub api_key: String,
    pub base_url: Url,
    pub timeout: Duration,
}

impl fmt::Debug for UpstreamSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub max_entries: usize,
}

#[derive(Debug, Clone)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RecentSettings {
    pub concurrency: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    load_with_environment(cli, environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__")
}

fn load_with_environment(cli: &CliArgs, environment: Environment) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(environment);

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Fetch(args)) => raw.apply_upstream_overrides(&args.upstream),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    upstream: RawUpstreamSettings,
    cache: RawCacheSettings,
    cors: RawCorsSettings,
    recent: RawRecentSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(base_path) = overrides.server_base_path.as_ref() {
            self.server.base_path = Some(base_path.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(max) = overrides.cache_max_entries {
            self.cache.max_entries = Some(max);
        }
        if let Some(origins) = overrides.cors_allowed_origins.as_ref() {
            self.cors.allowed_origins = Some(OriginList::Csv(origins.clone()));
        }
        if let Some(concurrency) = overrides.recent_concurrency {
            self.recent.concurrency = Some(concurrency);
        }
        self.apply_upstream_overrides(&overrides.upstream);
    }

    fn apply_upstream_overrides(&mut self, overrides: &UpstreamOverrides) {
        if let Some(key) = overrides.api_key.as_ref() {
            self.upstream.api_key = Some(key.clone());
        }
        if let Some(url) = overrides.base_url.as_ref() {
            self.upstream.base_url = Some(url.clone());
        }
        if let Some(timeout) = overrides.timeout_seconds {
            self.upstream.timeout_seconds = Some(timeout);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            upstream,
            cache,
            cors,
            recent,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            upstream: build_upstream_settings(upstream)?,
            cache: build_cache_settings(cache),
            cors: build_cors_settings(cors),
            recent: build_recent_settings(recent)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.host", reason))?;

    let base_path = server.base_path.as_deref().unwrap_or(DEFAULT_BASE_PATH);
    let base_path = normalize_base_path(base_path);

    Ok(ServerSettings { addr, base_path })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level.as_ref() {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let api_key = upstream
        .api_key
        .unwrap_or_else(|| DEFAULT_UPSTREAM_API_KEY.to_string())
        .trim()
        .to_string();
    if api_key.is_empty() {
        return Err(LoadError::invalid("upstream.api_key", "must not be empty"));
    }

    let raw_url = upstream
        .base_url
        .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());
    let base_url = Url::parse(raw_url.trim()).map_err(|err| {
        LoadError::invalid(
            "upstream.base_url",
            format!("invalid URL `{raw_url}`: {err}"),
        )
    })?;

    let timeout_seconds = upstream
        .timeout_seconds
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "upstream.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(UpstreamSettings {
        api_key,
        base_url,
        timeout: Duration::from_secs(timeout_seconds),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    CacheSettings {
        ttl: Duration::from_secs(cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS)),
        max_entries: cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
    }
}

fn build_cors_settings(cors: RawCorsSettings) -> CorsSettings {
    let allowed_origins = match cors.allowed_origins {
        Some(list) => list.into_origins(),
        None => vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
    };

    CorsSettings { allowed_origins }
}

fn build_recent_settings(recent: RawRecentSettings) -> Result<RecentSettings, LoadError> {
    let value = recent.concurrency.unwrap_or(DEFAULT_RECENT_CONCURRENCY);
    let Some(concurrency) = NonZeroUsize::new(value) else {
        return Err(LoadError::invalid(
            "recent.concurrency",
            "must be greater than zero",
        ));
    };

    Ok(RecentSettings { concurrency })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    base_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_seconds: Option<u64>,
    max_entries: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCorsSettings {
    allowed_origins: Option<OriginList>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRecentSettings {
    concurrency: Option<usize>,
}

/// Origins may be given as a list or, from the environment, as a comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OriginList {
    List(Vec<String>),
    Csv(String),
}

impl OriginList {
    fn into_origins(self) -> Vec<String> {
        let values = match self {
            OriginList::List(values) => values,
            OriginList::Csv(value) => value.split(',').map(str::to_string).collect(),
        };

        values
            .into_iter()
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn normalize_base_path(value: &str) -> String {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
