//! XML ↔ JSON conversion driven by a schema.
//!
//! JSON layout:
//!
//! * element children keyed by qualified name (`sdc4:label`), repeated
//!   children collected into arrays, in document order
//! * attributes keyed `@name`, namespace declarations `@xmlns` / `@xmlns:p`
//! * text of an element that also has attributes or children under `$`
//! * leaf elements as plain strings, empty leaves as `null`
//!
//! The document root is not wrapped: [`Converter::xml_to_json`] returns the
//! root's content, and [`Converter::json_to_xml`] takes the root name from
//! the schema's first global element declaration.

use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use roxmltree::Node;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::libxml2::decode_document;
use crate::schema_tree::{SchemaTree, parse_xml};
use crate::taxonomy::XSD_NAMESPACE;
use crate::validator::{ValidationResult, Validator, ValidatorOptions, instance_parse_error};

pub const TEXT_KEY: &str = "$";
pub const ATTRIBUTE_PREFIX: char = '@';

/// Converts documents of one schema. Both directions validate; any
/// validation error fails the conversion.
#[derive(Debug)]
pub struct Converter {
    validator: Validator,
    root_element: Option<String>,
    target_namespace: Option<String>,
}

impl Converter {
    /// Compile `schema` without the compliance check.
    pub fn new(schema: &Path) -> Result<Self> {
        let tree = SchemaTree::from_path(schema)?;
        let root_element = tree
            .global_element_names(XSD_NAMESPACE)
            .first()
            .map(|name| name.to_string());
        let target_namespace = tree.target_namespace().map(str::to_string);
        let validator = Validator::new(
            schema,
            ValidatorOptions::default().with_compliance_check(false),
        )?;

        Ok(Self {
            validator,
            root_element,
            target_namespace,
        })
    }

    pub fn root_element(&self) -> Option<&str> {
        self.root_element.as_deref()
    }

    pub fn xml_to_json(&self, xml: &Path) -> Result<Value> {
        let document = std::fs::read(xml)?;
        self.xml_bytes_to_json(&xml.display().to_string(), &document)
    }

    pub fn xml_str_to_json(&self, name: &str, xml: &str) -> Result<Value> {
        self.xml_bytes_to_json(name, xml.as_bytes())
    }

    /// Convert raw instance bytes in whatever encoding they declare.
    pub fn xml_bytes_to_json(&self, name: &str, document: &[u8]) -> Result<Value> {
        let result = self.validator.validate_bytes(name, document)?;
        ensure_valid(name, self.validator.schema_name(), &result)?;

        let text = decode_document(document).map_err(|e| instance_parse_error(name, e))?;
        let parsed = parse_xml(&text).map_err(|e| instance_parse_error(name, e))?;
        Ok(element_to_value(parsed.root_element()))
    }

    /// Render `data` as an indented XML document and validate it.
    pub fn json_to_xml_string(&self, data: &Value) -> Result<String> {
        let object = data.as_object().ok_or_else(|| Error::Conversion {
            details: "JSON document must be an object".to_string(),
        })?;
        let local = self.root_element.as_deref().ok_or_else(|| Error::Conversion {
            details: format!(
                "schema {} declares no global element",
                self.validator.schema_name()
            ),
        })?;

        let mut default_namespace = None;
        let root_name = match self.target_namespace.as_deref() {
            None => local.to_string(),
            Some(namespace) => match declared_prefix(object, namespace) {
                Some(Some(prefix)) => format!("{}:{}", prefix, local),
                Some(None) => local.to_string(),
                None => {
                    default_namespace = Some(namespace);
                    local.to_string()
                }
            },
        };

        let xml = render_xml(&root_name, data, default_namespace)?;
        let result = self.validator.validate_document(&root_name, &xml)?;
        ensure_valid(&root_name, self.validator.schema_name(), &result)?;
        Ok(xml)
    }

    /// Write the XML rendering of `data` to `output`, creating parent
    /// directories. Nothing is written when validation fails.
    pub fn json_to_xml(&self, data: &Value, output: &Path) -> Result<()> {
        let xml = self.json_to_xml_string(data)?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, xml)?;
        debug!(output = %output.display(), "XML written");
        Ok(())
    }
}

/// Convert an XML file to JSON against `schema`.
pub fn xml_to_json(xml: &Path, schema: &Path) -> Result<Value> {
    Converter::new(schema)?.xml_to_json(xml)
}

/// Convert JSON data to an XML file against `schema`.
pub fn json_to_xml(data: &Value, schema: &Path, output: &Path) -> Result<()> {
    Converter::new(schema)?.json_to_xml(data, output)
}

/// Parse JSON from a file path, or from `source` itself when no such file
/// exists.
pub fn load_json(source: &str) -> Result<Value> {
    let path = Path::new(source);
    let text = if path.is_file() {
        std::fs::read_to_string(path)?
    } else {
        source.to_string()
    };
    serde_json::from_str(&text).map_err(|e| Error::Conversion {
        details: format!("invalid JSON: {}", e),
    })
}

fn ensure_valid(name: &str, schema: &str, result: &ValidationResult) -> Result<()> {
    if result.is_valid {
        return Ok(());
    }
    let reasons: Vec<String> = result
        .structural_errors
        .iter()
        .chain(&result.semantic_errors)
        .map(ToString::to_string)
        .collect();
    Err(Error::Conversion {
        details: format!(
            "{} is not valid against {} ({} error(s)): {}",
            name,
            schema,
            reasons.len(),
            reasons.join("; ")
        ),
    })
}

/// `Some(Some(prefix))` for an `@xmlns:prefix` bound to `namespace`,
/// `Some(None)` for a matching `@xmlns`, `None` when undeclared.
fn declared_prefix<'a>(object: &'a Map<String, Value>, namespace: &str) -> Option<Option<&'a str>> {
    object.iter().find_map(|(key, value)| {
        if value.as_str() != Some(namespace) {
            return None;
        }
        if key == "@xmlns" {
            Some(None)
        } else {
            key.strip_prefix("@xmlns:").map(Some)
        }
    })
}

fn qualified_name(scope: Node, namespace: Option<&str>, local: &str) -> String {
    let prefix = namespace.and_then(|uri| {
        scope
            .namespaces()
            .find(|ns| ns.uri() == uri && ns.name().is_some())
            .and_then(|ns| ns.name())
    });
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

/// Namespace bindings declared on `node` itself rather than inherited.
fn own_namespaces<'a>(node: Node<'a, '_>) -> Vec<(Option<&'a str>, &'a str)> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|parent| parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    node.namespaces()
        .map(|ns| (ns.name(), ns.uri()))
        .filter(|binding| !inherited.contains(binding))
        .collect()
}

fn element_to_value(node: Node) -> Value {
    let mut map = Map::new();

    for (prefix, uri) in own_namespaces(node) {
        match prefix {
            Some("xml") => {}
            Some(prefix) => {
                map.insert(format!("@xmlns:{}", prefix), Value::from(uri));
            }
            None => {
                map.insert("@xmlns".to_string(), Value::from(uri));
            }
        }
    }

    for attr in node.attributes() {
        let key = format!(
            "{}{}",
            ATTRIBUTE_PREFIX,
            qualified_name(node, attr.namespace(), attr.name())
        );
        map.insert(key, Value::from(attr.value()));
    }

    let mut text = String::new();
    let mut has_children = false;
    for child in node.children() {
        if child.is_element() {
            has_children = true;
            let tag = child.tag_name();
            let key = qualified_name(child, tag.namespace(), tag.name());
            let value = element_to_value(child);
            match map.get_mut(&key) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(key, value);
                }
            }
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or_default());
        }
    }

    let trimmed = text.trim();
    if map.is_empty() && !has_children {
        return if trimmed.is_empty() {
            Value::Null
        } else {
            Value::from(text)
        };
    }
    if !trimmed.is_empty() {
        map.insert(TEXT_KEY.to_string(), Value::from(trimmed));
    }
    Value::Object(map)
}

pub(crate) fn render_xml(
    root_name: &str,
    data: &Value,
    default_namespace: Option<&str>,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, root_name, data, default_namespace)?;
    String::from_utf8(writer.into_inner()).map_err(|e| Error::Conversion {
        details: e.to_string(),
    })
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    value: &Value,
    default_namespace: Option<&str>,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    if let Some(namespace) = default_namespace {
        start.push_attribute(("xmlns", namespace));
    }

    match value {
        Value::Array(items) => {
            for item in items {
                write_element(writer, name, item, default_namespace)?;
            }
        }
        Value::Object(map) => {
            let mut text = None;
            let mut children = Vec::new();
            for (key, child) in map {
                if let Some(attr) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                    start.push_attribute((attr, scalar_text(key, child)?.as_str()));
                } else if key == TEXT_KEY {
                    text = Some(scalar_text(key, child)?);
                } else {
                    children.push((key, child));
                }
            }

            if text.is_none() && children.is_empty() {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }
            writer.write_event(Event::Start(start))?;
            if let Some(text) = &text {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            for (key, child) in children {
                write_element(writer, key, child, None)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Value::Null => writer.write_event(Event::Empty(start))?,
        scalar => {
            let text = scalar_text(name, scalar)?;
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
    }
    Ok(())
}

fn scalar_text(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(Error::Conversion {
            details: format!("'{}' must hold a scalar value", key),
        }),
    }
}
