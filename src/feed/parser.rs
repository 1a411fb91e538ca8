use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::tree::{Document, Node};

/// Key under which an element's grandchildren are collected.
pub const ITEM_KEY: &str = "item";

/// Container leaf fields captured as named properties during `process()`.
pub const PROPERTY_FIELDS: &[&str] = &[
    "ttl",
    "title",
    "link",
    "description",
    "language",
    "lastBuildDate",
    "pubDate",
];

/// Feed markup could not be turned into a [`ParsedFeed`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed markup, bad encoding or an unknown entity
    #[error("XML parse error: {0}")]
    Xml(String),
    /// The document ended while this element was still open
    #[error("Unterminated element <{0}>")]
    Unterminated(String),
    #[error("Document has no root element")]
    NoRoot,
    #[error("Unexpected content after the root element")]
    TrailingContent,
    /// SEC-003: Nesting depth exceeds safety limit
    #[error("Feed nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

#[derive(Debug, Error)]
#[error("Unsupported feed format: {0} (expected xml, rss, atom or rdf)")]
pub struct UnsupportedFormat(pub String);

/// Input syntax of the raw feed bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedFormat {
    /// RSS 2.0, RSS 1.0 (RDF) and Atom all go through the generic XML transform
    #[default]
    Xml,
}

impl FromStr for FeedFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" | "rss" | "atom" | "rdf" => Ok(FeedFormat::Xml),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}

/// One processed container child, e.g. `{"title": "Hello"}` or
/// `{"item": {"enclosure": {"url": "…"}}}`.
pub type Element = Map<String, Value>;

/// Ordered sequence of elements, serialized as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParsedFeed {
    elements: Vec<Element>,
}

impl ParsedFeed {
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.elements.iter().cloned().map(Value::Object).collect())
    }
}

impl From<Vec<Element>> for ParsedFeed {
    fn from(elements: Vec<Element>) -> Self {
        Self { elements }
    }
}

/// Converts raw feed bytes into a [`ParsedFeed`].
///
/// ```
/// use feedjson::feed::{FeedFormat, Parser};
///
/// let mut parser = Parser::new(FeedFormat::Xml);
/// let feed = parser
///     .set_contents("<rss><channel><title>Hello</title><ttl>5</ttl></channel></rss>")
///     .process()
///     .unwrap();
///
/// assert_eq!(feed.elements()[0]["title"], "Hello");
/// assert_eq!(parser.property("ttl"), Some("5"));
/// ```
#[derive(Debug, Default)]
pub struct Parser {
    format: FeedFormat,
    contents: Vec<u8>,
    properties: HashMap<String, String>,
}

impl Parser {
    pub fn new(format: FeedFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn format(&self) -> FeedFormat {
        self.format
    }

    /// Replace the bytes to parse. Properties of a previous run are dropped.
    pub fn set_contents(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.contents = bytes.into();
        self.properties.clear();
        self
    }

    /// Parse the current contents.
    ///
    /// For each child of the feed container (`<channel>`, or the root element
    /// when there is none):
    ///
    /// - a child without children in its own namespace becomes
    ///   `{name: text}`;
    /// - otherwise each such grandchild is recorded under `item`: as
    ///   `item[name] = text` when it has no attributes, or as
    ///   `item[name][attr] = value` for each attribute (its text is dropped);
    /// - then, for every namespace declared in the document, the child's
    ///   grandchildren in that namespace are recorded like the attribute case
    ///   above, into the same `item` map.
    ///
    /// Names are local names, so `media:content` and `content` share an
    /// `item` slot. Later writes replace earlier ones, keeping the key's
    /// first position.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the bytes are not well-formed XML. No
    /// partial result is produced and properties stay empty.
    pub fn process(&mut self) -> Result<ParsedFeed, ParseError> {
        self.properties.clear();

        let document = match self.format {
            FeedFormat::Xml => Document::parse(&self.contents)?,
        };
        let (feed, properties) = transform(&document);

        tracing::debug!(
            elements = feed.len(),
            properties = properties.len(),
            namespaces = document.namespaces.len(),
            "Feed processed"
        );
        self.properties = properties;
        Ok(feed)
    }

    /// A well-known container field (see [`PROPERTY_FIELDS`]) from the last
    /// successful `process()`.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Feed-declared cache lifetime (`<ttl>` minutes).
    ///
    /// `None` when the feed has no `ttl` or it is not a non-negative integer.
    pub fn ttl(&self) -> Option<Duration> {
        let raw = self.property("ttl")?;
        match raw.trim().parse::<u64>() {
            Ok(minutes) => Some(Duration::from_secs(minutes.saturating_mul(60))),
            Err(e) => {
                tracing::warn!(ttl = %raw, error = %e, "Ignoring non-numeric feed ttl");
                None
            }
        }
    }
}

fn transform(document: &Document) -> (ParsedFeed, HashMap<String, String>) {
    let container = document.root.first_child("channel").unwrap_or(&document.root);
    let mut elements = Vec::new();
    let mut properties = HashMap::new();

    for child in container.own_children() {
        let mut element = Element::new();
        let mut items: Option<Map<String, Value>> = None;

        let mut grandchildren = child.own_children().peekable();
        if grandchildren.peek().is_none() {
            element.insert(child.name.clone(), Value::String(child.text.clone()));
            if PROPERTY_FIELDS.contains(&child.name.as_str()) {
                properties.insert(child.name.clone(), child.text.clone());
            }
        } else {
            for item in grandchildren {
                let items = items.get_or_insert_with(Map::new);
                if item.attributes.is_empty() {
                    items.insert(item.name.clone(), Value::String(item.text.clone()));
                } else {
                    record_attributes(items, item);
                }
            }
        }

        // Must run after the default pass: namespaced items win on name clashes
        for uri in document.namespace_uris() {
            for item in child.children_in(Some(uri)) {
                if !item.attributes.is_empty() {
                    record_attributes(items.get_or_insert_with(Map::new), item);
                }
            }
        }

        if let Some(items) = items {
            element.insert(ITEM_KEY.to_string(), Value::Object(items));
        }
        elements.push(element);
    }

    (ParsedFeed::from(elements), properties)
}

/// `items[name][attr] = value` for every attribute of `item`. A text value
/// already stored under `name` is replaced by the attribute map.
fn record_attributes(items: &mut Map<String, Value>, item: &Node) {
    let attributes = item
        .attributes
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())));

    match items.get_mut(&item.name) {
        Some(Value::Object(existing)) => existing.extend(attributes),
        _ => {
            items.insert(item.name.clone(), Value::Object(attributes.collect()));
        }
    }
}
