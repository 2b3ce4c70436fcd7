//! Forward-only element cursor over a markup stream
//!
//! Wraps a `quick_xml::Reader` and hands out owned elements one at a time,
//! so record decoders can walk a subtree without holding borrowed events.
//! Only the current element path is kept; nothing is buffered beyond the
//! reader's own read buffer.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use std::str::FromStr;

use super::error::{DecodeError, Result};
use super::models::Ordinal;

/// An opened element: its name, attributes, and whether it was self-closing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    /// `<tag/>`: no children and no closing tag will follow
    pub empty: bool,
    /// Byte offset of the start tag
    pub offset: u64,
}

impl Element {
    /// Attribute value; `Some("")` for a present-but-empty attribute
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attr_string(&self, key: &str) -> Option<String> {
        self.attr(key).map(str::to_string)
    }

    /// Parse a numeric attribute; a blank value counts as absent
    pub fn attr_number<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.attr(key) {
            Some(raw) => parse_number(&format!("{}@{}", self.name, key), raw, self.offset),
            None => Ok(None),
        }
    }

    /// Parse a boolean attribute (`true|false|1|0`); a blank value counts as absent
    pub fn attr_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.attr(key) {
            Some(raw) => parse_bool(&format!("{}@{}", self.name, key), raw, self.offset),
            None => Ok(None),
        }
    }
}

enum Node {
    Open(Element),
    Text(String),
    Close(String),
    Eof,
}

/// Pull cursor over element boundaries
pub struct XmlCursor<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> XmlCursor<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = true;
        config.expand_empty_elements = false;

        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
        }
    }

    /// Bytes consumed from the underlying stream so far
    pub fn offset(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn next_node(&mut self) -> Result<Node> {
        loop {
            self.buf.clear();
            let offset = self.reader.buffer_position() as u64;
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|source| xml_error(source, offset))?;

            return match event {
                Event::Start(start) => Ok(Node::Open(open_element(&start, false, offset)?)),
                Event::Empty(start) => Ok(Node::Open(open_element(&start, true, offset)?)),
                Event::End(end) => Ok(Node::Close(utf8(end.name().as_ref(), offset)?.to_string())),
                Event::Text(text) => {
                    let text = text.unescape().map_err(|source| xml_error(source, offset))?;
                    Ok(Node::Text(text.into_owned()))
                },
                Event::CData(data) => Ok(Node::Text(utf8(&data.into_inner(), offset)?.to_string())),
                Event::Eof => Ok(Node::Eof),
                // Declarations, comments, processing instructions, doctype
                _ => continue,
            };
        }
    }

    /// Advance to the document's root element
    pub fn root(&mut self, expected: &str) -> Result<Element> {
        loop {
            match self.next_node()? {
                Node::Open(element) => return Ok(element),
                Node::Text(_) => continue,
                Node::Close(name) => {
                    return Err(DecodeError::UnexpectedElement {
                        expected: expected.to_string(),
                        found: format!("/{name}"),
                        offset: self.offset(),
                    })
                },
                Node::Eof => {
                    return Err(DecodeError::UnexpectedEof {
                        element: expected.to_string(),
                        offset: self.offset(),
                    })
                },
            }
        }
    }

    /// Next child element of `parent`, or `None` once `parent` closes
    ///
    /// Stray character data between children is ignored.
    pub fn next_child(&mut self, parent: &Element) -> Result<Option<Element>> {
        if parent.empty {
            return Ok(None);
        }

        loop {
            match self.next_node()? {
                Node::Open(element) => return Ok(Some(element)),
                Node::Text(_) => continue,
                Node::Close(name) if name == parent.name => return Ok(None),
                Node::Close(name) => {
                    return Err(DecodeError::UnexpectedElement {
                        expected: format!("/{}", parent.name),
                        found: format!("/{name}"),
                        offset: self.offset(),
                    })
                },
                Node::Eof => {
                    return Err(DecodeError::UnexpectedEof {
                        element: parent.name.clone(),
                        offset: self.offset(),
                    })
                },
            }
        }
    }

    /// Text content of a leaf element; `""` for `<tag/>` and `<tag></tag>`
    pub fn text(&mut self, element: &Element) -> Result<String> {
        if element.empty {
            return Ok(String::new());
        }

        let mut content = String::new();
        loop {
            match self.next_node()? {
                Node::Text(text) => content.push_str(&text),
                Node::Close(_) => return Ok(content),
                Node::Open(child) => {
                    return Err(DecodeError::UnexpectedNesting {
                        element: element.name.clone(),
                        child: child.name,
                        offset: child.offset,
                    })
                },
                Node::Eof => {
                    return Err(DecodeError::UnexpectedEof {
                        element: element.name.clone(),
                        offset: self.offset(),
                    })
                },
            }
        }
    }

    /// Parse a numeric leaf element; blank content counts as absent
    pub fn number<T>(&mut self, element: &Element) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.text(element)?;
        parse_number(&element.name, &raw, element.offset)
    }

    /// Consume an element and its whole subtree
    pub fn skip(&mut self, element: &Element) -> Result<()> {
        if element.empty {
            return Ok(());
        }

        let mut depth = 1usize;
        loop {
            match self.next_node()? {
                Node::Open(child) if !child.empty => depth += 1,
                Node::Open(_) | Node::Text(_) => {},
                Node::Close(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                },
                Node::Eof => {
                    return Err(DecodeError::UnexpectedEof {
                        element: element.name.clone(),
                        offset: self.offset(),
                    })
                },
            }
        }
    }

    /// Collect the text of every `<item>` child of a list element, in order
    ///
    /// Children with other names are skipped.
    pub fn text_list(&mut self, list: &Element, item: &str) -> Result<Vec<String>> {
        let mut values = Vec::new();
        while let Some(child) = self.next_child(list)? {
            if child.name == item {
                let value = self.text(&child)?;
                push_bounded(&mut values, value, list)?;
            } else {
                self.skip(&child)?;
            }
        }
        Ok(values)
    }
}

/// Append to an ordered collection, refusing to outgrow the ordinal type
pub fn push_bounded<T>(collection: &mut Vec<T>, item: T, list: &Element) -> Result<()> {
    if collection.len() >= Ordinal::MAX as usize {
        return Err(DecodeError::CollectionTooLarge {
            collection: list.name.clone(),
            offset: list.offset,
        });
    }
    collection.push(item);
    Ok(())
}

fn open_element(start: &BytesStart<'_>, empty: bool, offset: u64) -> Result<Element> {
    let name = utf8(start.name().as_ref(), offset)?.to_string();
    let mut attributes = Vec::new();

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| DecodeError::Xml {
            offset,
            source: e.into(),
        })?;
        let key = utf8(attribute.key.as_ref(), offset)?.to_string();
        let value = attribute
            .unescape_value()
            .map_err(|source| xml_error(source, offset))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        attributes,
        empty,
        offset,
    })
}

/// Undecodable bytes are reported as an encoding error, not a syntax error
fn xml_error(source: quick_xml::Error, offset: u64) -> DecodeError {
    match source {
        quick_xml::Error::Encoding(_) => DecodeError::Encoding { offset },
        source => DecodeError::Xml { offset, source },
    }
}

fn utf8(bytes: &[u8], offset: u64) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| DecodeError::Encoding { offset })
}

fn parse_number<T>(field: &str, raw: &str, offset: u64) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .parse()
        .map(Some)
        .map_err(|e: T::Err| DecodeError::InvalidNumber {
            field: field.to_string(),
            value: trimmed.to_string(),
            reason: e.to_string(),
            offset,
        })
}

fn parse_bool(field: &str, raw: &str, offset: u64) -> Result<Option<bool>> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        _ => Err(DecodeError::InvalidBoolean {
            field: field.to_string(),
            value: raw.to_string(),
            offset,
        }),
    }
}
