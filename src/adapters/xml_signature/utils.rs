//! XML processing utilities for signature handling
//!
//! Elements are located by byte span in the original text so that signed
//! content can be digested exactly as published.

use std::collections::HashMap;
use std::ops::Range;

use base64::Engine;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::constants::SIGNATURE_ELEMENT;
use super::types::{XmlSignatureError, XmlSignatureResult};

/// Location of one element in a document
#[derive(Debug, Clone)]
pub struct ElementSpan {
    /// Offset of the opening `<`
    pub start: usize,
    /// Offset just past the closing tag
    pub end: usize,
    pub content: Range<usize>,
    /// Nesting depth, the root element is at depth 0
    pub depth: usize,
    pub attributes: HashMap<String, String>,
}

impl ElementSpan {
    pub fn outer<'a>(&self, xml: &'a str) -> &'a str {
        &xml[self.start..self.end]
    }

    pub fn text<'a>(&self, xml: &'a str) -> &'a str {
        xml[self.content.clone()].trim()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

struct OpenElement {
    start: usize,
    content_start: usize,
    depth: usize,
    attributes: HashMap<String, String>,
}

fn collect_attributes(element: &BytesStart<'_>) -> XmlSignatureResult<HashMap<String, String>> {
    let mut attributes = HashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| XmlSignatureError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlSignatureError::Xml(e.to_string()))?
            .into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

/// Find all elements with the given local name, in document order
pub fn find_elements(xml: &str, local_name: &str) -> XmlSignatureResult<Vec<ElementSpan>> {
    let mut reader = Reader::from_str(xml);
    let wanted = local_name.as_bytes();
    let mut open: Vec<OpenElement> = Vec::new();
    let mut spans = Vec::new();
    let mut depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| XmlSignatureError::Xml(e.to_string()))?;
        // tags never contain a raw '<', so the last one before `after` opens this tag
        let after = reader.buffer_position() as usize;
        let before = xml[..after].rfind('<').unwrap_or(0);

        match event {
            Event::Start(e) => {
                if e.local_name().as_ref() == wanted {
                    open.push(OpenElement {
                        start: before,
                        content_start: after,
                        depth,
                        attributes: collect_attributes(&e)?,
                    });
                }
                depth += 1;
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if e.local_name().as_ref() == wanted {
                    if let Some(element) = open.pop() {
                        spans.push(ElementSpan {
                            start: element.start,
                            end: after,
                            content: element.content_start..before,
                            depth: element.depth,
                            attributes: element.attributes,
                        });
                    }
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == wanted {
                    spans.push(ElementSpan {
                        start: before,
                        end: after,
                        content: after..after,
                        depth,
                        attributes: collect_attributes(&e)?,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    spans.sort_by_key(|span| span.start);
    Ok(spans)
}

/// First element with the given local name
pub fn find_element(xml: &str, local_name: &str) -> XmlSignatureResult<Option<ElementSpan>> {
    Ok(find_elements(xml, local_name)?.into_iter().next())
}

/// The enveloped signature: a `Signature` child of the root element
pub fn find_enveloped_signature(xml: &str) -> XmlSignatureResult<Option<ElementSpan>> {
    Ok(find_elements(xml, SIGNATURE_ELEMENT)?
        .into_iter()
        .find(|span| span.depth == 1))
}

/// Apply the enveloped-signature transform
pub fn remove_signature(xml: &str) -> XmlSignatureResult<String> {
    match find_enveloped_signature(xml)? {
        Some(span) => Ok(format!("{}{}", &xml[..span.start], &xml[span.end..])),
        None => Ok(xml.to_string()),
    }
}

/// Insert signature markup right before the closing tag of the root element
pub fn insert_before_root_end(xml: &str, signature: &str) -> XmlSignatureResult<String> {
    let position = xml
        .trim_end()
        .rfind("</")
        .ok_or_else(|| XmlSignatureError::Xml("document has no closing root tag".to_string()))?;
    Ok(format!("{}{signature}{}", &xml[..position], &xml[position..]))
}

/// Decode base64 element text, ignoring embedded whitespace
pub fn decode_base64_text(text: &str) -> XmlSignatureResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}
