//! Field-addressable fixture documents (XML, JSON, or opaque text).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::{parser, writer, Package};

use crate::error::{GhostError, GhostResult};

/// Payload encoding of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Xml,
    Json,
    /// Served verbatim; never rewritten.
    Text,
}

impl PayloadFormat {
    /// Guess the format from the first non-whitespace character.
    pub fn detect(text: &str) -> Self {
        match text.trim_start().chars().next() {
            Some('<') => PayloadFormat::Xml,
            Some('{') | Some('[') => PayloadFormat::Json,
            _ => PayloadFormat::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Xml => "xml",
            PayloadFormat::Json => "json",
            PayloadFormat::Text => "text",
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed fixture payload.
///
/// XML fields are addressed by element or attribute local name, JSON fields by
/// object key at any depth.
pub enum Document {
    Xml(Package),
    Json(Value),
    Text(String),
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Document::Xml(_) => f.write_str("Document::Xml(..)"),
            Document::Json(value) => f.debug_tuple("Document::Json").field(value).finish(),
            Document::Text(text) => f.debug_tuple("Document::Text").field(text).finish(),
        }
    }
}

impl Document {
    pub fn parse(text: &str, format: PayloadFormat) -> GhostResult<Self> {
        match format {
            PayloadFormat::Xml => parser::parse(text)
                .map(Document::Xml)
                .map_err(|e| GhostError::Parse {
                    format,
                    message: format!("{e:?}"),
                }),
            PayloadFormat::Json => serde_json::from_str(text)
                .map(Document::Json)
                .map_err(|e| GhostError::Parse {
                    format,
                    message: e.to_string(),
                }),
            PayloadFormat::Text => Ok(Document::Text(text.to_string())),
        }
    }

    pub fn format(&self) -> PayloadFormat {
        match self {
            Document::Xml(_) => PayloadFormat::Xml,
            Document::Json(_) => PayloadFormat::Json,
            Document::Text(_) => PayloadFormat::Text,
        }
    }

    pub fn to_text(&self) -> GhostResult<String> {
        let serialize_error = |message: String| GhostError::Serialize {
            format: self.format(),
            message,
        };
        match self {
            Document::Xml(package) => {
                let mut output = Vec::new();
                writer::format_document(&package.as_document(), &mut output)
                    .map_err(|e| serialize_error(e.to_string()))?;
                String::from_utf8(output).map_err(|e| serialize_error(e.to_string()))
            }
            Document::Json(value) => {
                serde_json::to_string(value).map_err(|e| serialize_error(e.to_string()))
            }
            Document::Text(text) => Ok(text.clone()),
        }
    }

    /// Current values of every field carried under one of `names`, in document order.
    pub fn field_values(&self, names: &[String]) -> Vec<String> {
        let mut values = Vec::new();
        match self {
            Document::Xml(package) => {
                for_each_element(package, &mut |element| {
                    if let Some(attribute) = matching_attribute(element, names) {
                        values.push(attribute.value().to_string());
                    }
                    if names.iter().any(|n| n == element.name().local_part()) {
                        if let Some(text) = sole_text(element) {
                            values.push(text.text().to_string());
                        }
                    }
                });
            }
            Document::Json(value) => collect_json(value, names, &mut values),
            Document::Text(_) => {}
        }
        values
    }

    /// Replace every field under one of `names` whose whole value equals `from`.
    ///
    /// Returns the number of fields rewritten.
    pub fn replace_field(&mut self, names: &[String], from: &str, to: &str) -> usize {
        match self {
            Document::Xml(package) => {
                let mut count = 0;
                for_each_element(package, &mut |element| {
                    for name in names {
                        if element.attribute_value(name.as_str()) == Some(from) {
                            element.set_attribute_value(name.as_str(), to);
                            count += 1;
                        }
                    }
                    if names.iter().any(|n| n == element.name().local_part()) {
                        if let Some(text) = sole_text(element) {
                            if text.text() == from {
                                text.set_text(to);
                                count += 1;
                            }
                        }
                    }
                });
                count
            }
            Document::Json(value) => replace_json(value, names, from, to),
            Document::Text(_) => 0,
        }
    }
}

fn for_each_element<'d>(package: &'d Package, f: &mut impl FnMut(Element<'d>)) {
    let document = package.as_document();
    for child in document.root().children() {
        if let ChildOfRoot::Element(element) = child {
            visit_element(element, f);
        }
    }
}

fn visit_element<'d>(element: Element<'d>, f: &mut impl FnMut(Element<'d>)) {
    f(element);
    for child in element.children() {
        if let ChildOfElement::Element(nested) = child {
            visit_element(nested, f);
        }
    }
}

fn matching_attribute<'d>(
    element: Element<'d>,
    names: &[String],
) -> Option<sxd_document::dom::Attribute<'d>> {
    names.iter().find_map(|name| element.attribute(name.as_str()))
}

/// The element's text, when it consists of exactly one text node.
fn sole_text(element: Element<'_>) -> Option<sxd_document::dom::Text<'_>> {
    let mut texts = element.children().into_iter().filter_map(|child| match child {
        ChildOfElement::Text(text) => Some(text),
        _ => None,
    });
    match (texts.next(), texts.next()) {
        (Some(text), None) => Some(text),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn collect_json(value: &Value, names: &[String], values: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if names.iter().any(|n| n == key) {
                    if let Some(text) = scalar_text(child) {
                        values.push(text);
                        continue;
                    }
                }
                collect_json(child, names, values);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_json(item, names, values);
            }
        }
        _ => {}
    }
}

fn replace_json(value: &mut Value, names: &[String], from: &str, to: &str) -> usize {
    match value {
        Value::Object(map) => {
            let mut count = 0;
            for (key, child) in map.iter_mut() {
                if names.iter().any(|n| n == key) && scalar_text(child).as_deref() == Some(from) {
                    // Numbers stay numbers when the replacement is numeric.
                    *child = match (&*child, to.parse::<serde_json::Number>()) {
                        (Value::Number(_), Ok(number)) => Value::Number(number),
                        _ => Value::String(to.to_string()),
                    };
                    count += 1;
                } else {
                    count += replace_json(child, names, from, to);
                }
            }
            count
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|item| replace_json(item, names, from, to))
            .sum(),
        _ => 0,
    }
}
