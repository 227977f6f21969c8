//! XMLTV feed parser
//!
//! Turns a raw feed into one [`FeedNode`] per `<programme>` element. Child
//! elements become fields that are either a plain value, a structured value
//! with its own children, or a repeated value when the same element name
//! occurs more than once. Simple accessors only ever see plain values.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("{message} (at byte {position})")]
pub struct FeedParseError {
    pub message: String,
    pub position: u64,
}

/// A field of a programme element.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Element with text content only. Empty elements carry an empty string.
    Scalar(String),
    /// Element with child elements; its own text is discarded.
    Structured(FieldMap),
    /// Element name seen more than once under the same parent.
    Repeated(Vec<FieldValue>),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(text) => Some(text),
            _ => None,
        }
    }

    /// Child field of a structured value.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        match self {
            FieldValue::Structured(children) => children.get(name),
            _ => None,
        }
    }

    /// Non-empty plain values of a single or repeated field.
    pub fn scalars(&self) -> Vec<&str> {
        match self {
            FieldValue::Scalar(text) if !text.is_empty() => vec![text.as_str()],
            FieldValue::Repeated(values) => values
                .iter()
                .filter_map(FieldValue::as_scalar)
                .filter(|text| !text.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap(HashMap<String, FieldValue>);

impl FieldMap {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert a field, folding duplicates into a repeated value.
    pub fn insert(&mut self, name: String, value: FieldValue) {
        match self.0.remove(&name) {
            None => {
                self.0.insert(name, value);
            }
            Some(FieldValue::Repeated(mut values)) => {
                values.push(value);
                self.0.insert(name, FieldValue::Repeated(values));
            }
            Some(previous) => {
                self.0.insert(name, FieldValue::Repeated(vec![previous, value]));
            }
        }
    }
}

/// One `<programme>` element of a feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedNode {
    pub attributes: HashMap<String, String>,
    pub fields: FieldMap,
}

impl FeedNode {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Plain text of a field. Structured, repeated and empty fields read as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name)
            .and_then(FieldValue::as_scalar)
            .filter(|text| !text.is_empty())
    }
}

struct Frame {
    name: String,
    attributes: HashMap<String, String>,
    text: String,
    children: FieldMap,
}

impl Frame {
    fn new(name: String, attributes: HashMap<String, String>) -> Self {
        Self {
            name,
            attributes,
            text: String::new(),
            children: FieldMap::default(),
        }
    }

    fn into_field(self) -> (String, FieldValue) {
        let value = if self.children.is_empty() {
            FieldValue::Scalar(self.text.trim().to_string())
        } else {
            FieldValue::Structured(self.children)
        };
        (self.name, value)
    }

    fn into_node(self) -> FeedNode {
        FeedNode {
            attributes: self.attributes,
            fields: self.children,
        }
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn parse_error(reader: &Reader<&[u8]>, message: String) -> FeedParseError {
    FeedParseError {
        message,
        position: reader.buffer_position() as u64,
    }
}

fn read_attributes(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
) -> Result<HashMap<String, String>, FeedParseError> {
    let mut attributes = HashMap::new();
    for attr in e.attributes() {
        let attr =
            attr.map_err(|err| parse_error(reader, format!("invalid attribute: {}", err)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| parse_error(reader, format!("invalid attribute value: {}", err)))?;
        attributes.insert(key, value.into_owned());
    }
    Ok(attributes)
}

/// Parse an XMLTV document into programme nodes.
///
/// Any XML error fails the whole feed; no partial result is returned.
pub fn parse_xmltv(content: &[u8]) -> Result<Vec<FeedNode>, FeedParseError> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(true);

    let mut nodes = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                let name = element_name(e);
                if depth == 1 {
                    saw_root = true;
                } else if !stack.is_empty() {
                    stack.push(Frame::new(name, HashMap::new()));
                } else if depth == 2 && name == "programme" {
                    let attributes = read_attributes(&reader, e)?;
                    stack.push(Frame::new(name, attributes));
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = element_name(e);
                if depth == 0 {
                    saw_root = true;
                } else if let Some(top) = stack.last_mut() {
                    top.children.insert(name, FieldValue::Scalar(String::new()));
                } else if depth == 1 && name == "programme" {
                    nodes.push(FeedNode {
                        attributes: read_attributes(&reader, e)?,
                        fields: FieldMap::default(),
                    });
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(top) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| parse_error(&reader, format!("invalid text: {}", err)))?;
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::End(_)) => {
                if let Some(frame) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => {
                            let (name, value) = frame.into_field();
                            parent.children.insert(name, value);
                        }
                        None => nodes.push(frame.into_node()),
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(&reader, format!("XML parsing error: {}", e))),
            _ => {}
        }

        buf.clear();
    }

    if !saw_root {
        return Err(parse_error(&reader, "feed has no root element".to_string()));
    }
    if depth != 0 {
        return Err(parse_error(
            &reader,
            "feed ended inside an open element".to_string(),
        ));
    }

    Ok(nodes)
}
