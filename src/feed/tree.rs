//! Typed XML tree for feed documents.
//!
//! The parser walks this structure instead of reader events, so the feed
//! transform only depends on names, text, attributes, children and the
//! document's namespace table.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, PrefixDeclaration, ResolveResult};
use quick_xml::NsReader;
use std::fmt::Display;

use super::parser::ParseError;

/// SEC-003: Maximum allowed element nesting depth.
/// Prevents unbounded memory growth from maliciously deep documents.
pub const MAX_DEPTH: usize = 256;

/// One XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    /// Local name, without prefix (`content` for `<media:content>`)
    pub name: String,
    pub prefix: Option<String>,
    /// Resolved namespace URI, `None` for elements in no namespace
    pub namespace: Option<String>,
    /// Direct text and CDATA content joined in order, trimmed at both ends
    pub text: String,
    /// Attributes in document order, keyed by qualified name.
    /// Namespace declarations are not included.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Node {
    /// Children bound to `namespace` (`None` = no namespace).
    pub fn children_in<'a>(&'a self, namespace: Option<&'a str>) -> impl Iterator<Item = &'a Node> {
        self.children
            .iter()
            .filter(move |child| child.namespace.as_deref() == namespace)
    }

    /// Children in this node's own namespace.
    pub fn own_children(&self) -> impl Iterator<Item = &Node> {
        self.children_in(self.namespace.as_deref())
    }

    pub fn first_child(&self, local_name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == local_name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A namespace declared somewhere in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// `None` for a default namespace (`xmlns="…"`)
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Node,
    /// Declarations in document order; a URI appears at most once
    pub namespaces: Vec<NamespaceDecl>,
}

impl Document {
    /// Parse a complete XML document.
    ///
    /// # Errors
    ///
    /// Any syntax error, mismatched or unterminated element, missing root,
    /// content after the root, unknown entity, or nesting beyond
    /// [`MAX_DEPTH`] yields a [`ParseError`]; no partial tree is returned.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        // SEC-002: XXE protection. quick-xml (0.37) never expands <!ENTITY>
        // declarations; unescaping resolves only the five XML builtins and
        // character references, and custom entities fail as errors.
        // Runs are kept untrimmed so text split by CDATA or comments joins
        // back with its spacing; each node is trimmed once when it closes
        let mut reader = NsReader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut builder = TreeBuilder::default();
        let mut buf = Vec::new();

        loop {
            let (resolved, event) = reader
                .read_resolved_event_into(&mut buf)
                .map_err(xml_error)?;
            // The resolution borrows the reader, so detach it right away
            let namespace = owned_namespace(resolved)?;

            match event {
                Event::Start(e) => {
                    let node = builder.element(&e, namespace)?;
                    builder.open(node)?;
                }
                Event::Empty(e) => {
                    let node = builder.element(&e, namespace)?;
                    builder.attach(node)?;
                }
                Event::End(_) => builder.close()?,
                Event::Text(t) => {
                    let text = t.unescape().map_err(xml_error)?;
                    builder.text(&text);
                }
                Event::CData(c) => {
                    let text = String::from_utf8(c.into_inner().into_owned()).map_err(xml_error)?;
                    builder.text(&text);
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions and DOCTYPE
                // carry nothing the feed transform reads
                _ => {}
            }
            buf.clear();
        }

        builder.finish()
    }

    /// Distinct namespace URIs in declaration order.
    pub fn namespace_uris(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(|decl| decl.uri.as_str())
    }
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Node>,
    root: Option<Node>,
    namespaces: Vec<NamespaceDecl>,
}

impl TreeBuilder {
    fn element(&mut self, e: &BytesStart<'_>, namespace: Option<String>) -> Result<Node, ParseError> {
        let name = utf8(e.local_name().as_ref())?;
        let prefix = e
            .name()
            .prefix()
            .map(|p| utf8(p.as_ref()))
            .transpose()?;

        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(xml_error)?;
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            match attr.key.as_namespace_binding() {
                Some(PrefixDeclaration::Default) => self.declare(None, value),
                Some(PrefixDeclaration::Named(p)) => self.declare(Some(utf8(p)?), value),
                None => attributes.push((utf8(attr.key.as_ref())?, value)),
            }
        }

        Ok(Node {
            name,
            prefix,
            namespace,
            attributes,
            ..Node::default()
        })
    }

    fn declare(&mut self, prefix: Option<String>, uri: String) {
        // xmlns="" undeclares the default namespace
        if uri.is_empty() || self.namespaces.iter().any(|decl| decl.uri == uri) {
            return;
        }
        self.namespaces.push(NamespaceDecl { prefix, uri });
    }

    fn open(&mut self, node: Node) -> Result<(), ParseError> {
        if self.root.is_some() {
            return Err(ParseError::TrailingContent);
        }
        if self.stack.len() >= MAX_DEPTH {
            return Err(ParseError::MaxDepthExceeded(MAX_DEPTH));
        }
        self.stack.push(node);
        Ok(())
    }

    fn attach(&mut self, node: Node) -> Result<(), ParseError> {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None if self.root.is_none() => self.root = Some(node),
            None => return Err(ParseError::TrailingContent),
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ParseError> {
        let node = self
            .stack
            .pop()
            .ok_or_else(|| ParseError::Xml("end tag without matching start tag".to_string()))?;
        self.attach(trimmed(node))
    }

    fn text(&mut self, text: &str) {
        // Text outside the root element (BOM remnants, stray whitespace) is ignored
        if let Some(node) = self.stack.last_mut() {
            node.text.push_str(text);
        }
    }

    fn finish(self) -> Result<Document, ParseError> {
        if let Some(open) = self.stack.last() {
            return Err(ParseError::Unterminated(open.name.clone()));
        }
        let root = self.root.ok_or(ParseError::NoRoot)?;
        Ok(Document {
            root,
            namespaces: self.namespaces,
        })
    }
}

fn trimmed(mut node: Node) -> Node {
    let text = node.text.trim();
    if text.len() != node.text.len() {
        node.text = text.to_owned();
    }
    node
}

fn owned_namespace(resolved: ResolveResult<'_>) -> Result<Option<String>, ParseError> {
    match resolved {
        ResolveResult::Bound(Namespace(uri)) => utf8(uri).map(Some),
        // An undeclared prefix leaves the element in no namespace
        ResolveResult::Unbound | ResolveResult::Unknown(_) => Ok(None),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, ParseError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(xml_error)
}

fn xml_error(e: impl Display) -> ParseError {
    ParseError::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";

    #[test]
    fn test_parse_simple_tree() {
        let doc = Document::parse(
            br#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Hello</title><link>https://example.com</link></channel></rss>"#,
        )
        .unwrap();

        assert_eq!(doc.root.name, "rss");
        assert_eq!(doc.root.attribute("version"), Some("2.0"));
        let channel = doc.root.first_child("channel").unwrap();
        let names: Vec<_> = channel.children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["title", "link"]);
        assert_eq!(channel.children[0].text, "Hello");
        assert!(doc.namespaces.is_empty());
    }

    #[test]
    fn test_namespaces_resolved_and_collected() {
        let doc = Document::parse(
            br#"<rss xmlns:media="http://search.yahoo.com/mrss/" xmlns:dc="http://purl.org/dc/elements/1.1/">
<channel><item><media:content url="a.mp4"/><dc:creator>Ann</dc:creator></item></channel></rss>"#,
        )
        .unwrap();

        let uris: Vec<_> = doc.namespace_uris().collect();
        assert_eq!(uris, vec![MEDIA_NS, "http://purl.org/dc/elements/1.1/"]);
        assert_eq!(doc.namespaces[0].prefix.as_deref(), Some("media"));
        assert!(doc.root.attributes.is_empty(), "xmlns declarations are not attributes");

        let item = &doc.root.children[0].children[0];
        let content = &item.children[0];
        assert_eq!(content.name, "content");
        assert_eq!(content.prefix.as_deref(), Some("media"));
        assert_eq!(content.namespace.as_deref(), Some(MEDIA_NS));
        assert_eq!(item.children_in(Some(MEDIA_NS)).count(), 1);
        assert_eq!(item.own_children().count(), 0);
    }

    #[test]
    fn test_default_namespace_applies_to_descendants() {
        let doc = Document::parse(
            br#"<feed xmlns="http://www.w3.org/2005/Atom"><title>T</title></feed>"#,
        )
        .unwrap();

        assert_eq!(doc.namespaces[0].prefix, None);
        assert_eq!(doc.root.namespace.as_deref(), Some("http://www.w3.org/2005/Atom"));
        assert_eq!(doc.root.own_children().count(), 1);
    }

    #[test]
    fn test_duplicate_namespace_uri_collapsed() {
        let doc = Document::parse(
            br#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel xmlns:m="http://search.yahoo.com/mrss/"/></rss>"#,
        )
        .unwrap();
        assert_eq!(doc.namespaces.len(), 1);
        assert_eq!(doc.namespaces[0].prefix.as_deref(), Some("media"));
    }

    #[test]
    fn test_text_entities_and_cdata() {
        let doc = Document::parse(
            br#"<a><b>Tom &amp; Jerry</b><c><![CDATA[<p>raw</p>]]></c></a>"#,
        )
        .unwrap();
        assert_eq!(doc.root.children[0].text, "Tom & Jerry");
        assert_eq!(doc.root.children[1].text, "<p>raw</p>");
    }

    #[test]
    fn test_text_split_by_cdata_keeps_spacing() {
        let doc = Document::parse(b"<a><title>Breaking: <![CDATA[big]]> news</title></a>").unwrap();
        assert_eq!(doc.root.children[0].text, "Breaking: big news");
    }

    #[test]
    fn test_text_split_by_comment_keeps_spacing() {
        let doc = Document::parse(b"<a><title>Hello <!-- aside --> world</title></a>").unwrap();
        assert_eq!(doc.root.children[0].text, "Hello  world");
    }

    #[test]
    fn test_text_trimmed_once_per_node() {
        let doc = Document::parse(
            b"<a>\n  <b>  padded  </b>\n  <c>\n    <![CDATA[ inner ]]>\n  </c>\n</a>\n",
        )
        .unwrap();
        assert_eq!(doc.root.text, "");
        assert_eq!(doc.root.children[0].text, "padded");
        assert_eq!(doc.root.children[1].text, "inner");
    }

    #[test]
    fn test_unterminated_document() {
        let err = Document::parse(b"<rss><channel><title>x</title>").unwrap_err();
        assert!(matches!(err, ParseError::Unterminated(name) if name == "channel"));
    }

    #[test]
    fn test_broken_markup() {
        assert!(Document::parse(b"<not valid xml").is_err());
        assert!(Document::parse(b"<a><b></a>").is_err());
    }

    #[test]
    fn test_no_root() {
        assert!(matches!(Document::parse(b""), Err(ParseError::NoRoot)));
        assert!(matches!(
            Document::parse(b"<?xml version=\"1.0\"?>"),
            Err(ParseError::NoRoot)
        ));
    }

    #[test]
    fn test_second_root_rejected() {
        assert!(matches!(
            Document::parse(b"<a/><b/>"),
            Err(ParseError::TrailingContent)
        ));
    }

    #[test]
    fn test_unknown_entity_rejected() {
        assert!(Document::parse(b"<a>&xxe;</a>").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "<a>".repeat(MAX_DEPTH + 1), "</a>".repeat(MAX_DEPTH + 1));
        assert!(matches!(
            Document::parse(deep.as_bytes()),
            Err(ParseError::MaxDepthExceeded(MAX_DEPTH))
        ));

        let ok = format!("{}{}", "<a>".repeat(MAX_DEPTH), "</a>".repeat(MAX_DEPTH));
        assert!(Document::parse(ok.as_bytes()).is_ok());
    }
}
