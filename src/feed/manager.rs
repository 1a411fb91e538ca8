use std::time::Duration;
use url::Url;

use super::fetcher::Connector;
use super::parser::{FeedFormat, ParsedFeed, Parser};
use super::{ConfigurationError, FeedError};
use crate::storage::{CacheAdapter, CacheStore};
use crate::util::validate_feed_url;

/// Validated, immutable description of one feed to process.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    url: Url,
    format: FeedFormat,
    use_cache: bool,
}

impl FeedSettings {
    /// Validate `url` and build settings with caching on and the XML format.
    ///
    /// With `block_private_hosts`, localhost and private networks are
    /// rejected too.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] for an empty, unparseable, non-HTTP(S) or
    /// (when blocked) private URL. Nothing is fetched or read before this.
    pub fn parse(url: &str, block_private_hosts: bool) -> Result<Self, ConfigurationError> {
        let url = validate_feed_url(url, block_private_hosts)?;
        Ok(Self {
            url,
            format: FeedFormat::default(),
            use_cache: true,
        })
    }

    pub fn with_format(mut self, format: FeedFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn format(&self) -> FeedFormat {
        self.format
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }
}

/// Drives one feed through cache, connector and parser.
///
/// Owns its collaborators for its whole lifetime; none of them refer back.
/// Separate managers share nothing mutable, so different feeds can be
/// processed concurrently. Two managers missing on the same URL at once
/// will both fetch and both write; the last write wins.
pub struct Manager<C, S> {
    settings: FeedSettings,
    connector: C,
    parser: Parser,
    cache: CacheAdapter<S>,
}

impl<C: Connector, S: CacheStore> Manager<C, S> {
    pub fn new(settings: FeedSettings, connector: C, cache: CacheAdapter<S>) -> Self {
        let parser = Parser::new(settings.format());
        Self {
            settings,
            connector,
            parser,
            cache,
        }
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn cache(&self) -> &CacheAdapter<S> {
        &self.cache
    }

    /// Property of the most recently parsed feed (see [`Parser::property`]).
    pub fn property(&self, name: &str) -> Option<&str> {
        self.parser.property(name)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.parser.ttl()
    }

    /// Produce the parsed feed, going to the network only when needed.
    ///
    /// - Cache off: fetch, parse.
    /// - Miss: fetch, store, parse.
    /// - Hit: parse the cached bytes. Without a feed `ttl` the entry never
    ///   expires. With one, an entry older than the ttl is re-fetched,
    ///   re-stored and re-parsed.
    ///
    /// # Errors
    ///
    /// [`FeedError::Retrieval`], [`FeedError::Parse`] or
    /// [`FeedError::Cache`], surfaced as-is. Nothing is retried and no
    /// partial result is returned.
    pub async fn process(&mut self) -> Result<ParsedFeed, FeedError> {
        let url = self.settings.url.as_str().to_owned();

        if !self.settings.use_cache {
            tracing::debug!(url = %url, "Cache disabled, fetching");
            let bytes = self.connector.fetch(&url).await?;
            return Ok(self.parser.set_contents(bytes).process()?);
        }

        let cached = match self.cache.get_data(&url)? {
            Some(bytes) if bytes.is_empty() => {
                tracing::warn!(url = %url, "Cached feed is empty, treating as a miss");
                None
            }
            other => other,
        };

        let Some(bytes) = cached else {
            tracing::debug!(url = %url, "Cache miss, fetching");
            return self.refresh(&url).await;
        };

        let feed = self.parser.set_contents(bytes).process()?;

        let Some(ttl) = self.parser.ttl() else {
            tracing::debug!(url = %url, "Cache hit, feed declares no ttl");
            return Ok(feed);
        };

        if !self.cache.is_stale(&url, ttl)? {
            tracing::debug!(url = %url, ttl_secs = ttl.as_secs(), "Cache hit, still fresh");
            return Ok(feed);
        }

        tracing::debug!(url = %url, ttl_secs = ttl.as_secs(), "Cache hit is stale, refreshing");
        self.refresh(&url).await
    }

    /// Fetch, store, then parse what was fetched.
    async fn refresh(&mut self, url: &str) -> Result<ParsedFeed, FeedError> {
        let bytes = self.connector.fetch(url).await?;
        self.cache.update_cache(url, &bytes)?;
        Ok(self.parser.set_contents(bytes).process()?)
    }
}
