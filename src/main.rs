use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use feedjson::config::{Config, ConfigError};
use feedjson::feed::{
    ConfigurationError, FeedError, FeedFormat, FeedSettings, HttpConnector, Manager,
};
use feedjson::output::{to_json, to_jsonp, JsonOptions, DEFAULT_CALLBACK};
use feedjson::storage::{CacheAdapter, DiskCacheStore};

/// Get the user's home directory, if any.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Default config file (~/.config/feedjson/config.toml)
fn default_config_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".config").join("feedjson").join("config.toml"))
}

/// Default cache directory (~/.cache/feedjson), or a temp dir without HOME
fn default_cache_dir() -> PathBuf {
    home_dir()
        .map(|home| home.join(".cache").join("feedjson"))
        .unwrap_or_else(|| std::env::temp_dir().join("feedjson"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedjson",
    about = "Fetch an RSS/XML feed and print it as JSON or JSONP"
)]
struct Args {
    /// Feed URL (falls back to `feed_url` in the config file)
    url: Option<String>,

    /// Always fetch, never read or write the cache
    #[arg(long)]
    no_cache: bool,

    /// Input format: xml, rss, atom or rdf
    #[arg(long, value_name = "FORMAT")]
    format: Option<String>,

    /// Cache directory (default ~/.cache/feedjson)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Wrap the output as JSONP; name the callback with `--callback=NAME`
    #[arg(long, value_name = "NAME", num_args = 0..=1, require_equals = true)]
    callback: Option<Option<String>>,

    /// Emit arrays as index-keyed objects (an empty feed prints `{}`)
    #[arg(long)]
    force_object: bool,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,

    /// Config file (default ~/.config/feedjson/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only the encoded feed
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            if is_configuration_error(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(args: Args) -> Result<String> {
    let config = match args.config.clone().or_else(default_config_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => {
            tracing::debug!("HOME not set and no --config given, using default configuration");
            Config::default()
        }
    };

    // A missing URL goes through validation too, so it reports like an empty one
    let url = args
        .url
        .or_else(|| config.feed_url.clone())
        .unwrap_or_default();
    let format: FeedFormat = args
        .format
        .as_deref()
        .unwrap_or(&config.format)
        .parse()
        .map_err(|e| FeedError::from(ConfigurationError::from(e)))?;
    let settings = FeedSettings::parse(&url, config.block_private_hosts)
        .map_err(FeedError::from)?
        .with_format(format)
        .with_cache(config.cache && !args.no_cache);

    let cache_dir = args
        .cache_dir
        .or_else(|| config.cache_dir.clone())
        .unwrap_or_else(default_cache_dir);
    let cache = CacheAdapter::new(DiskCacheStore::new(cache_dir))
        .stale_when_unknown(config.stale_when_unknown);

    let client = reqwest::Client::builder()
        .user_agent(concat!("feedjson/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let connector = HttpConnector::new(client).with_timeout(config.request_timeout());

    let mut manager = Manager::new(settings, connector, cache);
    let feed = manager
        .process()
        .await
        .with_context(|| format!("Failed to process feed {url}"))?;
    tracing::info!(url = %url, elements = feed.len(), ttl = ?manager.ttl(), "Feed ready");

    let options = JsonOptions {
        force_object: args.force_object || config.force_object,
        pretty: args.pretty || config.pretty,
    };
    let callback = match args.callback {
        Some(Some(name)) => Some(name),
        Some(None) => Some(
            config
                .callback
                .clone()
                .unwrap_or_else(|| DEFAULT_CALLBACK.to_string()),
        ),
        None => config.callback.clone(),
    };

    let output = match callback {
        Some(name) => to_jsonp(&feed, options, Some(&name)),
        None => to_json(&feed, options),
    }
    .context("Failed to encode feed")?;

    Ok(output)
}

fn is_configuration_error(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause.is::<ConfigError>()
            || matches!(
                cause.downcast_ref::<FeedError>(),
                Some(FeedError::Configuration(_))
            )
    })
}
