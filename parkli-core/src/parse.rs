//! Decoders turning raw upstream payloads into per-source records.
//!
//! Parsers only answer "can these bytes be read"; they never look at
//! reference data or resolve identities.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::de::DeserializeOwned;

use crate::http::Payload;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to parse {source_name} payload: {cause}")]
/// Payload could not be decoded.
pub struct ParseError {
    source_name: String,
    cause: String,
}

impl ParseError {
    /// Create an error for `source_name` with the decoder's message.
    pub fn new(source_name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            cause: cause.into(),
        }
    }

    /// Source whose payload failed.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Underlying decoder message.
    #[must_use]
    pub fn cause(&self) -> &str {
        &self.cause
    }
}

/// A decoder for one upstream wire format.
pub trait FormatParser {
    /// Record type produced per facility.
    type Record;

    /// Decode a payload into records.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the payload is malformed. Missing optional
    /// fields are never an error.
    fn parse(&self, raw: &Payload) -> Result<Vec<Self::Record>, ParseError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// One matched XML element: its attributes and the text of its direct children.
pub struct XmlElement {
    attributes: BTreeMap<String, String>,
    children: BTreeMap<String, String>,
}

impl XmlElement {
    /// Attribute value by local name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Text content of a direct child element by local name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.children.get(name).map(String::as_str)
    }
}

/// Collects every element with a given local name, wherever it sits in the document.
#[derive(Debug, Clone)]
pub struct XmlParser {
    source_name: &'static str,
    element: &'static str,
}

impl XmlParser {
    /// Parser for `element` on behalf of `source_name`.
    #[must_use]
    pub fn new(source_name: &'static str, element: &'static str) -> Self {
        Self {
            source_name,
            element,
        }
    }

    /// Value of `attribute` on the document's root element.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the payload is not XML.
    pub fn root_attribute(&self, raw: &Payload, attribute: &str) -> Result<Option<String>, ParseError> {
        let text = self.text(raw)?;
        let mut reader = Reader::from_str(&text);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Start(start) | Event::Empty(start)) => {
                    return Ok(attributes(&start)
                        .map_err(|cause| self.error(cause))?
                        .remove(attribute));
                }
                Ok(Event::Eof) => return Err(self.error("document has no root element")),
                Ok(_) => {}
                Err(err) => return Err(self.error(err.to_string())),
            }
        }
    }

    fn text<'p>(&self, raw: &'p Payload) -> Result<Cow<'p, str>, ParseError> {
        raw.as_text()
            .ok_or_else(|| self.error("expected an XML document, got JSON"))
    }

    fn error(&self, cause: impl Into<String>) -> ParseError {
        ParseError::new(self.source_name, cause)
    }
}

struct OpenElement {
    element: XmlElement,
    depth: usize,
    child: Option<String>,
}

impl FormatParser for XmlParser {
    type Record = XmlElement;

    fn parse(&self, raw: &Payload) -> Result<Vec<XmlElement>, ParseError> {
        let text = self.text(raw)?;
        let mut reader = Reader::from_str(&text);
        reader.config_mut().trim_text(true);

        let mut records = Vec::new();
        let mut open: Option<OpenElement> = None;
        let mut saw_root = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|err| self.error(err.to_string()))?;

            match event {
                Event::Start(start) => {
                    saw_root = true;
                    if let Some(current) = open.as_mut() {
                        current.depth += 1;
                        if current.depth == 2 {
                            current.child = Some(local_name(&start));
                        }
                    } else if local_name(&start) == self.element {
                        open = Some(OpenElement {
                            element: XmlElement {
                                attributes: attributes(&start).map_err(|cause| self.error(cause))?,
                                children: BTreeMap::new(),
                            },
                            depth: 1,
                            child: None,
                        });
                    }
                }
                Event::Empty(start) => {
                    saw_root = true;
                    if open.is_none() && local_name(&start) == self.element {
                        records.push(XmlElement {
                            attributes: attributes(&start).map_err(|cause| self.error(cause))?,
                            children: BTreeMap::new(),
                        });
                    }
                }
                Event::Text(content) => {
                    if let Some(current) = open.as_mut()
                        && current.depth == 2
                        && let Some(child) = current.child.as_ref()
                    {
                        let value = content
                            .unescape()
                            .map_err(|err| self.error(err.to_string()))?;
                        current
                            .element
                            .children
                            .entry(child.clone())
                            .or_default()
                            .push_str(&value);
                    }
                }
                Event::CData(content) => {
                    if let Some(current) = open.as_mut()
                        && current.depth == 2
                        && let Some(child) = current.child.as_ref()
                    {
                        let value = String::from_utf8_lossy(&content.into_inner()).into_owned();
                        current
                            .element
                            .children
                            .entry(child.clone())
                            .or_default()
                            .push_str(&value);
                    }
                }
                Event::End(_) => {
                    if let Some(mut current) = open.take() {
                        current.depth -= 1;
                        match current.depth {
                            0 => records.push(current.element),
                            1 => {
                                current.child = None;
                                open = Some(current);
                            }
                            _ => open = Some(current),
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(self.error("document has no root element"));
        }
        if open.is_some() {
            return Err(self.error(format!("unterminated <{}> element", self.element)));
        }

        Ok(records)
    }
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn attributes(start: &BytesStart<'_>) -> Result<BTreeMap<String, String>, String> {
    let mut map = BTreeMap::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| err.to_string())?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

/// Decodes JSON documents into typed records.
///
/// Accepts an already decoded [`Payload::Json`] or a textual body. An array
/// yields one record per element, a bare object yields exactly one record.
#[derive(Debug, Clone)]
pub struct JsonParser<T> {
    source_name: &'static str,
    record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> JsonParser<T> {
    /// Parser producing `T` on behalf of `source_name`.
    #[must_use]
    pub fn new(source_name: &'static str) -> Self {
        Self {
            source_name,
            record: PhantomData,
        }
    }

    /// Decode the whole payload as a single `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the payload is not JSON or does not match `T`.
    pub fn parse_document(&self, raw: &Payload) -> Result<T, ParseError> {
        let value = self.value(raw)?;
        T::deserialize(&value).map_err(|err| self.error(err.to_string()))
    }

    fn value(&self, raw: &Payload) -> Result<serde_json::Value, ParseError> {
        match raw {
            Payload::Json(value) => Ok(value.clone()),
            Payload::Text(_) | Payload::Bytes(_) => {
                let text = raw
                    .as_text()
                    .ok_or_else(|| self.error("body is not valid UTF-8"))?;
                serde_json::from_str(&text).map_err(|err| self.error(err.to_string()))
            }
        }
    }

    fn error(&self, cause: impl Into<String>) -> ParseError {
        ParseError::new(self.source_name, cause)
    }
}

impl<T: DeserializeOwned> FormatParser for JsonParser<T> {
    type Record = T;

    fn parse(&self, raw: &Payload) -> Result<Vec<T>, ParseError> {
        let value = self.value(raw)?;
        let elements = match value {
            serde_json::Value::Array(elements) => elements,
            object @ serde_json::Value::Object(_) => vec![object],
            other => {
                return Err(self.error(format!(
                    "expected an array or object, got {}",
                    json_type(&other)
                )));
            }
        };

        elements
            .iter()
            .map(|element| T::deserialize(element).map_err(|err| self.error(err.to_string())))
            .collect()
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
