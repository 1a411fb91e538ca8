//! Fetch an RSS/XML feed, cache the raw bytes with a time-to-live, and turn
//! the feed into a generic structure ready for JSON or JSONP output.
//!
//! - [`feed`]: connector, parser and the [`feed::Manager`] that ties them
//!   to the cache
//! - [`storage`]: URL-keyed raw feed cache with disk and memory backends
//! - [`output`]: JSON / JSONP encoding
//! - [`config`]: optional TOML configuration file
//! - [`util`]: feed URL validation

pub mod config;
pub mod feed;
pub mod output;
pub mod storage;
pub mod util;
