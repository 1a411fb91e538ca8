//! Utility functions shared by the library and the binary.
//!
//! - **URL validation**: feed URLs are checked before any cache or network
//!   access, optionally rejecting localhost and private networks.

mod url_validator;

pub use url_validator::{validate_feed_url, UrlValidationError};
