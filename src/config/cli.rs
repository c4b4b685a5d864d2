use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use url::Url;

/// Command-line arguments for the remote-purge binary.
#[derive(Debug, Parser)]
#[command(
    name = "remote-purge",
    version,
    about = "Remote cache purge endpoint with a rotatable secret key"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "REMOTE_PURGE_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and admin HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Print the purge URL, seeding the key if none exists yet.
    #[command(name = "show-url")]
    ShowUrl(StoreArgs),
    /// Rotate the purge key and print the new purge URL.
    Regenerate(StoreArgs),
    /// Call a purge URL and report the result.
    Trigger(TriggerArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the public site URL the purge link is built on.
    #[arg(long = "purge-site-url", value_name = "URL")]
    pub site_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct TriggerArgs {
    /// Full purge URL, including the key parameter.
    #[arg(long, value_name = "URL")]
    pub url: Url,

    /// Give up after this many seconds.
    #[arg(long = "timeout-seconds", value_name = "SECONDS", default_value_t = 10)]
    pub timeout_seconds: u64,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

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

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the public site URL the purge link is built on.
    #[arg(long = "purge-site-url", value_name = "URL")]
    pub purge_site_url: Option<String>,

    /// Override the query parameter carrying the purge key.
    #[arg(long = "purge-query-param", value_name = "NAME")]
    pub purge_query_param: Option<String>,

    /// Notify this URL after every successful purge.
    #[arg(long = "purge-webhook-url", value_name = "URL")]
    pub purge_webhook_url: Option<String>,

    /// Override how long regeneration links stay valid.
    #[arg(long = "regeneration-nonce-ttl-seconds", value_name = "SECONDS")]
    pub nonce_ttl_seconds: Option<u64>,

    /// Override how many rendered responses the public cache keeps.
    #[arg(long = "cache-response-limit", value_name = "COUNT")]
    pub cache_response_limit: Option<usize>,
}
