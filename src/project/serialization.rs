// Serialization utilities for project persistence
//
// Project files are gzip-compressed XML. This module owns the codec:
// a small element tree over quick-xml, gzip framing via flate2, and the
// typed-value encodings used inside the document (flat parameters,
// dictionaries and lists).

use crate::value::Value;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event as XmlEvent};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Errors raised while decoding or encoding a document
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Document has no root element")]
    EmptyDocument,

    #[error("Missing <{node}> in <{parent}>")]
    MissingNode { node: String, parent: String },

    #[error("Invalid value in <{node}>: {reason}")]
    InvalidValue { node: String, reason: String },
}

/// One element of the document tree; text content is not kept
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First direct child with the given name, or a MissingNode error
    pub fn require_child(&self, name: &str) -> Result<&XmlElement, SerializationError> {
        self.child(name).ok_or_else(|| SerializationError::MissingNode {
            node: name.to_string(),
            parent: self.name.clone(),
        })
    }

    /// All direct children with the given name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn xml_error(e: impl std::fmt::Display) -> SerializationError {
    SerializationError::Xml(e.to_string())
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, SerializationError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(xml_error)?
        .to_string();
    let mut element = XmlElement::new(&name);
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(xml_error)?
            .to_string();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Parse XML text into its root element
pub fn parse_document(text: &str) -> Result<XmlElement, SerializationError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let finished = match reader.read_event().map_err(xml_error)? {
            XmlEvent::Start(start) => {
                stack.push(element_from_start(&start)?);
                None
            }
            XmlEvent::Empty(start) => Some(element_from_start(&start)?),
            XmlEvent::End(_) => stack.pop(),
            XmlEvent::Eof => break,
            _ => None,
        };

        if let Some(element) = finished {
            match stack.last_mut() {
                Some(parent) => parent.push(element),
                None if root.is_none() => root = Some(element),
                None => return Err(xml_error("more than one root element")),
            }
        }
    }

    if !stack.is_empty() {
        return Err(xml_error("unexpected end of document"));
    }
    root.ok_or(SerializationError::EmptyDocument)
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    element: &XmlElement,
) -> Result<(), SerializationError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer
            .write_event(XmlEvent::Empty(start))
            .map_err(xml_error)?;
    } else {
        writer
            .write_event(XmlEvent::Start(start))
            .map_err(xml_error)?;
        for child in &element.children {
            write_element(writer, child)?;
        }
        writer
            .write_event(XmlEvent::End(BytesEnd::new(element.name.as_str())))
            .map_err(xml_error)?;
    }
    Ok(())
}

/// Render a root element as indented XML text
pub fn write_document(root: &XmlElement) -> Result<String, SerializationError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(XmlEvent::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    write_element(&mut writer, root)?;
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

/// Read and parse a gzip-compressed document
pub fn read_compressed_document(path: &Path) -> Result<XmlElement, SerializationError> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    parse_document(&text)
}

/// Write a document gzip-compressed, replacing the file atomically
pub fn write_compressed_document(path: &Path, root: &XmlElement) -> Result<(), SerializationError> {
    let text = write_document(root)?;

    let temp_path = path.with_extension("jokosher.tmp");
    {
        let file = File::create(&temp_path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(text.as_bytes())?;
        encoder.finish()?.sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Typed values inside the document

fn value_from_attrs(node: &XmlElement, type_key: &str, value_key: &str) -> Result<Value, SerializationError> {
    let type_name = node.attr(type_key).unwrap_or("str");
    let text = node.attr(value_key).unwrap_or("");
    Value::parse(type_name, text).ok_or_else(|| SerializationError::InvalidValue {
        node: node.name.clone(),
        reason: format!("'{}' is not a valid {}", text, type_name),
    })
}

/// Flat key/value parameters of one entity
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamMap {
    values: BTreeMap<String, Value>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encode as `<Parameters><key type=".." value=".."/>...</Parameters>`
    pub fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new("Parameters");
        for (key, value) in &self.values {
            node.push(
                XmlElement::new(key)
                    .with_attr("type", value.type_name())
                    .with_attr("value", value.to_text()),
            );
        }
        node
    }

    /// Decode a `<Parameters>` node
    pub fn from_xml(node: &XmlElement) -> Result<Self, SerializationError> {
        let mut params = Self::new();
        for child in &node.children {
            let value = value_from_attrs(child, "type", "value")?;
            params.values.insert(child.name.clone(), value);
        }
        Ok(params)
    }
}

/// Encode key/value pairs as `<Item key keytype value type/>` children
pub fn store_dictionary(node: &mut XmlElement, entries: &[(Value, Value)]) {
    for (key, value) in entries {
        node.push(
            XmlElement::new("Item")
                .with_attr("key", key.to_text())
                .with_attr("keytype", key.type_name())
                .with_attr("value", value.to_text())
                .with_attr("type", value.type_name()),
        );
    }
}

/// Decode the `<Item>` children written by [`store_dictionary`]
pub fn load_dictionary(node: &XmlElement) -> Result<Vec<(Value, Value)>, SerializationError> {
    node.children_named("Item")
        .map(|item| {
            let key = value_from_attrs(item, "keytype", "key")?;
            let value = value_from_attrs(item, "type", "value")?;
            Ok((key, value))
        })
        .collect()
}

/// Encode values as `<Item value type/>` children
pub fn store_list(node: &mut XmlElement, values: &[Value]) {
    for value in values {
        node.push(
            XmlElement::new("Item")
                .with_attr("value", value.to_text())
                .with_attr("type", value.type_name()),
        );
    }
}

/// Decode the `<Item>` children written by [`store_list`]
pub fn load_list(node: &XmlElement) -> Result<Vec<Value>, SerializationError> {
    node.children_named("Item")
        .map(|item| value_from_attrs(item, "type", "value"))
        .collect()
}

/// Encode waveform levels as a comma-separated string
pub fn levels_to_text(levels: &[f32]) -> String {
    levels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode a comma-separated levels string
pub fn levels_from_text(text: &str) -> Result<Vec<f32>, SerializationError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| SerializationError::InvalidValue {
                    node: "Levels".to_string(),
                    reason: format!("'{}': {}", part, e),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_nested_document() {
        let text = r#"<?xml version="1.0"?>
<Root version="0.9">
  <Parameters>
    <name type="str" value="A &amp; B"/>
  </Parameters>
  <Instrument id="1"><Event id="2"/></Instrument>
</Root>"#;
        let root = parse_document(text).unwrap();
        assert_eq!(root.name, "Root");
        assert_eq!(root.attr("version"), Some("0.9"));

        let params = ParamMap::from_xml(root.require_child("Parameters").unwrap()).unwrap();
        assert_eq!(params.get_str("name"), Some("A & B"));

        let instrument = root.child("Instrument").unwrap();
        assert_eq!(instrument.children_named("Event").count(), 1);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_document("<Root><Open></Root>").is_err());
        assert!(parse_document("<Root>").is_err());
        assert!(matches!(
            parse_document("   "),
            Err(SerializationError::EmptyDocument)
        ));
    }

    #[test]
    fn test_write_then_parse_escapes_attributes() {
        let mut root = XmlElement::new("Root").with_attr("version", "0.9");
        root.push(XmlElement::new("Item").with_attr("value", "<\"quoted\" & more>"));
        let text = write_document(&root).unwrap();
        assert!(text.starts_with("<?xml"));

        let parsed = parse_document(&text).unwrap();
        assert_eq!(parsed, root);
    }

    #[test]
    fn test_parameters_invalid_value() {
        let node = parse_document(r#"<Parameters><pan type="float" value="left"/></Parameters>"#)
            .unwrap();
        assert!(matches!(
            ParamMap::from_xml(&node),
            Err(SerializationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_dictionary_and_list_encoding() {
        let mut node = XmlElement::new("FadePoints");
        store_dictionary(
            &mut node,
            &[
                (Value::Float(0.0), Value::Float(0.0)),
                (Value::Float(1.5), Value::Float(1.0)),
            ],
        );
        let entries = load_dictionary(&node).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], (Value::Float(1.5), Value::Float(1.0)));

        let mut command = XmlElement::new("Command");
        store_list(&mut command, &[Value::Int(3), Value::Str("x".into()), Value::None]);
        assert_eq!(
            load_list(&command).unwrap(),
            vec![Value::Int(3), Value::Str("x".into()), Value::None]
        );
    }

    #[test]
    fn test_levels_text() {
        assert_eq!(levels_to_text(&[0.5, 0.25]), "0.5,0.25");
        assert_eq!(levels_from_text("0.5, 0.25").unwrap(), vec![0.5, 0.25]);
        assert!(levels_from_text("").unwrap().is_empty());
        assert!(levels_from_text("0.5,x").is_err());
    }

    #[test]
    fn test_compressed_file_cycle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.jokosher");
        let root = XmlElement::new("Root").with_attr("version", "0.9");

        write_compressed_document(&path, &root).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        // gzip magic number
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(read_compressed_document(&path).unwrap(), root);
    }

    #[test]
    fn test_uncompressed_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.jokosher");
        std::fs::write(&path, "<Root version=\"0.9\"/>").unwrap();
        assert!(read_compressed_document(&path).is_err());
    }
}
