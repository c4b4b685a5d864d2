//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::*;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::{
    key_store::DEFAULT_OPTION_NAME,
    panel::DEFAULT_PURGE_PARAM,
    regeneration::{DEFAULT_NONCE_PARAM, DEFAULT_STATUS_PARAM, ERROR_PARAM},
};
use crate::infra::nonce::MAX_NONCE_TTL;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "remote-purge";
const ENV_PREFIX: &str = "REMOTE_PURGE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SITE_URL: &str = "http://127.0.0.1:3000/";
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;
const DEFAULT_NONCE_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_NONCE_CAPACITY: usize = 1024;
const DEFAULT_CACHE_RESPONSE_LIMIT: usize = 256;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub purge: PurgeSettings,
    pub regeneration: RegenerationSettings,
    pub cache: CacheSettings,
}

impl Settings {
    /// Database URL for commands that must not fall back to the in-memory store.
    pub fn require_database_url(&self) -> Result<&str, LoadError> {
        self.database.url.as_deref().ok_or_else(|| {
            LoadError::invalid(
                "database.url",
                "required by show-url and regenerate; an in-memory key is lost on exit",
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
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

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PurgeSettings {
    pub site_url: Url,
    pub query_param: String,
    pub option_name: String,
    pub webhook_url: Option<Url>,
    pub webhook_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RegenerationSettings {
    pub query_param: String,
    pub status_param: String,
    pub nonce_ttl: Duration,
    pub nonce_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub response_limit: NonZeroUsize,
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
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::ShowUrl(args)) | Some(Command::Regenerate(args)) => {
            raw.apply_store_overrides(args)
        }
        Some(Command::Trigger(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    purge: RawPurgeSettings,
    regeneration: RawRegenerationSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.purge_site_url.as_ref() {
            self.purge.site_url = Some(url.clone());
        }
        if let Some(param) = overrides.purge_query_param.as_ref() {
            self.purge.query_param = Some(param.clone());
        }
        if let Some(url) = overrides.purge_webhook_url.as_ref() {
            self.purge.webhook_url = Some(url.clone());
        }
        if let Some(ttl) = overrides.nonce_ttl_seconds {
            self.regeneration.nonce_ttl_seconds = Some(ttl);
        }
        if let Some(limit) = overrides.cache_response_limit {
            self.cache.response_limit = Some(limit);
        }
    }

    fn apply_store_overrides(&mut self, overrides: &StoreArgs) {
        self.apply_database_override(&overrides.database);
        if let Some(url) = overrides.site_url.as_ref() {
            self.purge.site_url = Some(url.clone());
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            purge,
            regeneration,
            cache,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let purge = build_purge_settings(purge)?;
        let regeneration = build_regeneration_settings(regeneration)?;
        let cache = build_cache_settings(cache)?;

        if purge.query_param == regeneration.query_param
            || purge.query_param == regeneration.status_param
        {
            return Err(LoadError::invalid(
                "purge.query_param",
                "must differ from the regeneration parameters",
            ));
        }

        Ok(Self {
            server,
            logging,
            database,
            purge,
            regeneration,
            cache,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;

    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "admin listener must not share the public address",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
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

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    let acquire_timeout = positive_seconds(
        database
            .acquire_timeout_seconds
            .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS),
        "database.acquire_timeout_seconds",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
        acquire_timeout,
    })
}

fn build_purge_settings(purge: RawPurgeSettings) -> Result<PurgeSettings, LoadError> {
    let site_url = parse_http_url(
        purge.site_url.as_deref().unwrap_or(DEFAULT_SITE_URL),
        "purge.site_url",
    )?;

    let query_param = param_name(purge.query_param, DEFAULT_PURGE_PARAM, "purge.query_param")?;

    let option_name = non_blank(purge.option_name).unwrap_or_else(|| DEFAULT_OPTION_NAME.into());

    let webhook_url = non_blank(purge.webhook_url)
        .map(|value| parse_http_url(&value, "purge.webhook_url"))
        .transpose()?;

    let webhook_timeout = positive_seconds(
        purge
            .webhook_timeout_seconds
            .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECS),
        "purge.webhook_timeout_seconds",
    )?;

    Ok(PurgeSettings {
        site_url,
        query_param,
        option_name,
        webhook_url,
        webhook_timeout,
    })
}

fn build_regeneration_settings(
    regeneration: RawRegenerationSettings,
) -> Result<RegenerationSettings, LoadError> {
    let query_param = param_name(
        regeneration.query_param,
        DEFAULT_NONCE_PARAM,
        "regeneration.query_param",
    )?;
    let status_param = param_name(
        regeneration.status_param,
        DEFAULT_STATUS_PARAM,
        "regeneration.status_param",
    )?;
    if query_param == status_param {
        return Err(LoadError::invalid(
            "regeneration.status_param",
            "must differ from regeneration.query_param",
        ));
    }

    let nonce_ttl = positive_seconds(
        regeneration
            .nonce_ttl_seconds
            .unwrap_or(DEFAULT_NONCE_TTL_SECS),
        "regeneration.nonce_ttl_seconds",
    )?;
    if nonce_ttl > MAX_NONCE_TTL {
        return Err(LoadError::invalid(
            "regeneration.nonce_ttl_seconds",
            format!("must not exceed {} seconds", MAX_NONCE_TTL.as_secs()),
        ));
    }

    let nonce_capacity = NonZeroUsize::new(
        regeneration
            .nonce_capacity
            .unwrap_or(DEFAULT_NONCE_CAPACITY),
    )
    .ok_or_else(|| LoadError::invalid("regeneration.nonce_capacity", "must be greater than zero"))?;

    Ok(RegenerationSettings {
        query_param,
        status_param,
        nonce_ttl,
        nonce_capacity,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let response_limit = NonZeroUsize::new(
        cache
            .response_limit
            .unwrap_or(DEFAULT_CACHE_RESPONSE_LIMIT),
    )
    .ok_or_else(|| LoadError::invalid("cache.response_limit", "must be greater than zero"))?;

    Ok(CacheSettings { response_limit })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    acquire_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPurgeSettings {
    site_url: Option<String>,
    query_param: Option<String>,
    option_name: Option<String>,
    webhook_url: Option<String>,
    webhook_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRegenerationSettings {
    query_param: Option<String>,
    status_param: Option<String>,
    nonce_ttl_seconds: Option<u64>,
    nonce_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    response_limit: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_http_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid url `{value}`: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{other}`; expected http or https"),
        )),
    }
}

fn param_name(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    let Some(value) = value else {
        return Ok(default.to_string());
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoadError::invalid(key, "parameter name must not be empty"));
    }
    if trimmed == ERROR_PARAM {
        return Err(LoadError::invalid(
            key,
            format!("`{ERROR_PARAM}` is reserved for regeneration errors"),
        ));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
