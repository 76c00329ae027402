//! Navigable XML node tree built from `quick-xml` events.
//!
//! Scanner reports are small enough to hold in memory, and the parsers need
//! random access (hosts first, then results that refer back to them), so the
//! whole document is materialized once. Every accessor returns an `Option`
//! or an empty value on absence; nothing here panics on a missing node.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Error raised when a report cannot be loaded as a tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("XML syntax error at byte {position}: {source}")]
    Syntax {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("invalid UTF-8 in element content at byte {position}")]
    Encoding { position: u64 },

    #[error("unknown entity reference '&{name};' at byte {position}")]
    UnknownEntity { name: String, position: u64 },

    #[error("element <{name}> is not closed at end of input")]
    Unclosed { name: String },

    #[error("unexpected content after the root element at byte {position}")]
    TrailingContent { position: u64 },

    #[error("document has no root element")]
    Empty,
}

/// A single element with its attributes, text and child elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw character data directly inside this element.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter()
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// All nodes reached by following a slash-separated child path.
    ///
    /// Every segment is a child tag name; all branches are explored in
    /// document order.
    pub fn find_all<'a>(&'a self, path: &str) -> Vec<&'a XmlNode> {
        let mut current = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(|node| {
                    node.children
                        .iter()
                        .filter(move |child| child.name == segment)
                })
                .collect();
        }
        current
    }

    /// First node reached by a slash-separated child path.
    pub fn find(&self, path: &str) -> Option<&XmlNode> {
        self.find_all(path).into_iter().next()
    }

    /// First node on `path` whose attribute `attr` equals `value`.
    pub fn find_where(&self, path: &str, attr: &str, value: &str) -> Option<&XmlNode> {
        self.find_all(path)
            .into_iter()
            .find(|node| node.attr(attr) == Some(value))
    }

    /// Trimmed text of the node at `path`, or an empty string.
    pub fn child_text(&self, path: &str) -> String {
        self.find(path)
            .map(|node| node.text.trim().to_string())
            .unwrap_or_default()
    }

    /// Trimmed text of every node at `path`, skipping empty ones.
    pub fn child_texts(&self, path: &str) -> Vec<String> {
        self.find_all(path)
            .into_iter()
            .map(|node| node.text.trim().to_string())
            .filter(|text| !text.is_empty())
            .collect()
    }
}

/// Parse a whole document into its root element.
pub fn parse(data: &[u8]) -> Result<XmlNode, TreeError> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| TreeError::Syntax {
                position: reader.error_position() as u64,
                source,
            })?;

        match event {
            Event::Start(start) => stack.push(open_element(&start, position)?),
            Event::Empty(start) => {
                let node = open_element(&start, position)?;
                attach(&mut stack, &mut root, node, position)?;
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node, position)?;
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = std::str::from_utf8(&text)
                        .map_err(|_| TreeError::Encoding { position })?;
                    current.text.push_str(decoded);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = std::str::from_utf8(&data)
                        .map_err(|_| TreeError::Encoding { position })?;
                    current.text.push_str(decoded);
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(current) = stack.last_mut() {
                    let name = std::str::from_utf8(&reference)
                        .map_err(|_| TreeError::Encoding { position })?;
                    let resolved = reference
                        .resolve_char_ref()
                        .map_err(|source| TreeError::Syntax { position, source })?;
                    match resolved {
                        Some(ch) => current.text.push(ch),
                        None => match quick_xml::escape::resolve_predefined_entity(name) {
                            Some(value) => current.text.push_str(value),
                            None => {
                                return Err(TreeError::UnknownEntity {
                                    name: name.to_string(),
                                    position,
                                })
                            }
                        },
                    }
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes carry no report data
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.pop() {
        return Err(TreeError::Unclosed { name: open.name });
    }
    root.ok_or(TreeError::Empty)
}

fn open_element(start: &BytesStart<'_>, position: u64) -> Result<XmlNode, TreeError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|_| TreeError::Encoding { position })?
        .to_string();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TreeError::Syntax {
            position,
            source: quick_xml::Error::from(e),
        })?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|_| TreeError::Encoding { position })?
            .to_string();
        let raw = std::str::from_utf8(&attr.value).map_err(|_| TreeError::Encoding { position })?;
        let value = quick_xml::escape::unescape(raw).map_err(|e| TreeError::Syntax {
            position,
            source: quick_xml::Error::from(e),
        })?;
        attributes.push((key, value.into_owned()));
    }

    Ok(XmlNode {
        name,
        attributes,
        ..XmlNode::default()
    })
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
    position: u64,
) -> Result<(), TreeError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(TreeError::TrailingContent { position }),
    }
    Ok(())
}
