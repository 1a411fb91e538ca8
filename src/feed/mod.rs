//! Feed retrieval, parsing and orchestration.
//!
//! - **Fetching**: [`Connector`] retrieves raw bytes; [`HttpConnector`] does it
//!   over HTTP with a timeout and size limit, one attempt per call
//! - **Parsing**: [`Parser`] turns RSS/Atom XML into a generic [`ParsedFeed`]
//!   via a typed [`Document`] tree, exposing container fields like `ttl`
//! - **Orchestration**: [`Manager`] decides between cache and network
//!
//! # Example
//!
//! ```no_run
//! use feedjson::feed::{FeedSettings, HttpConnector, Manager};
//! use feedjson::storage::{CacheAdapter, DiskCacheStore};
//!
//! # async fn example() -> Result<(), feedjson::feed::FeedError> {
//! let settings = FeedSettings::parse("https://example.com/feed.xml", true)?;
//! let connector = HttpConnector::new(reqwest::Client::new());
//! let cache = CacheAdapter::new(DiskCacheStore::new("/tmp/feedjson"));
//!
//! let mut manager = Manager::new(settings, connector, cache);
//! let feed = manager.process().await?;
//! println!("{} elements, ttl {:?}", feed.len(), manager.ttl());
//! # Ok(())
//! # }
//! ```

mod fetcher;
mod manager;
mod parser;
mod tree;

pub use fetcher::{Connector, FetchError, HttpConnector, DEFAULT_TIMEOUT, MAX_FEED_SIZE};
pub use manager::{FeedSettings, Manager};
pub use parser::{
    Element, FeedFormat, ParseError, ParsedFeed, Parser, UnsupportedFormat, ITEM_KEY,
    PROPERTY_FIELDS,
};
pub use tree::{Document, NamespaceDecl, Node, MAX_DEPTH};

use thiserror::Error;

use crate::storage::CacheError;
use crate::util::UrlValidationError;

/// Invalid input detected before any I/O.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Url(#[from] UrlValidationError),
    #[error(transparent)]
    Format(#[from] UnsupportedFormat),
}

/// Everything [`Manager::process`] can fail with.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid configuration")]
    Configuration(#[from] ConfigurationError),
    #[error("Failed to retrieve feed")]
    Retrieval(#[from] FetchError),
    #[error("Failed to parse feed")]
    Parse(#[from] ParseError),
    #[error("Cache error")]
    Cache(#[from] CacheError),
}
