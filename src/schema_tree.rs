//! Immutable arena representation of a parsed schema document.
//!
//! Every element is stored once in document order and addressed by a
//! [`NodeId`]; parents are plain indices, so "find the enclosing type" is an
//! upward index walk with no separate lookup table.

use std::path::Path;

use roxmltree::{Document, ParsingOptions};

use crate::error::{Error, Result};
use crate::libxml2::decode_document;

/// Stable index of an element inside a [`SchemaTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

/// One element of the schema document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNode {
    pub namespace: Option<String>,
    pub local_name: String,
    pub attributes: Vec<Attribute>,
    pub parent: Option<NodeId>,
    pub line: u32,
}

impl SchemaNode {
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    /// Value of an unqualified attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.namespace.is_none() && attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

/// Position and message of a well-formedness failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XmlSyntaxError {
    pub line: u32,
    pub column: u32,
    pub details: String,
}

/// Parse XML text with DTDs allowed, reporting the failure position.
pub(crate) fn parse_xml(text: &str) -> std::result::Result<Document<'_>, XmlSyntaxError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    Document::parse_with_options(text, options).map_err(|e| {
        let pos = e.pos();
        XmlSyntaxError {
            line: pos.row,
            column: pos.col,
            details: e.to_string(),
        }
    })
}

fn schema_parse_error(schema: &str, error: XmlSyntaxError) -> Error {
    Error::SchemaParse {
        schema: schema.to_string(),
        line: error.line,
        column: error.column,
        details: error.details,
    }
}

/// Arena of schema elements in document order; index 0 is the root.
#[derive(Debug, Clone)]
pub struct SchemaTree {
    source_name: String,
    nodes: Vec<SchemaNode>,
}

impl SchemaTree {
    /// Read and parse a schema file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SchemaNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let name = path.display().to_string();
        let text = decode_document(&bytes).map_err(|e| schema_parse_error(&name, e))?;
        Self::parse(&text, &name)
    }

    /// Parse schema text; `source_name` only labels diagnostics.
    pub fn parse(text: &str, source_name: &str) -> Result<Self> {
        let document = parse_xml(text).map_err(|e| schema_parse_error(source_name, e))?;

        let mut nodes: Vec<SchemaNode> = Vec::new();
        let mut index = std::collections::HashMap::new();

        for node in document.root_element().descendants().filter(|n| n.is_element()) {
            let parent = node
                .parent_element()
                .and_then(|p| index.get(&p.id()).copied());
            let attributes = node
                .attributes()
                .map(|attr| Attribute {
                    namespace: attr.namespace().map(str::to_string),
                    name: attr.name().to_string(),
                    value: attr.value().to_string(),
                })
                .collect();
            let line = document.text_pos_at(node.range().start).row;

            index.insert(node.id(), NodeId(nodes.len()));
            nodes.push(SchemaNode {
                namespace: node.tag_name().namespace().map(str::to_string),
                local_name: node.tag_name().name().to_string(),
                attributes,
                parent,
                line,
            });
        }

        Ok(Self {
            source_name: source_name.to_string(),
            nodes,
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `targetNamespace` declared on the document root.
    pub fn target_namespace(&self) -> Option<&str> {
        self.nodes.first()?.attribute("targetNamespace")
    }

    /// All element ids in document order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Elements with the given qualified name, at any depth, in document order.
    pub fn find_all<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.ids()
            .filter(move |&id| self.node(id).is(namespace, local_name))
    }

    /// Proper ancestors of `id`, innermost first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(id).parent, move |&current| {
            self.node(current).parent
        })
    }

    /// Direct children of `id` in document order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.ids()
            .filter(move |&child| self.node(child).parent == Some(id))
    }

    /// Names of the top-level `element` declarations, in document order.
    pub fn global_element_names<'a>(&'a self, xsd_namespace: &'a str) -> Vec<&'a str> {
        self.children(self.root())
            .map(|id| self.node(id))
            .filter(|node| node.is(xsd_namespace, "element"))
            .filter_map(|node| node.attribute("name"))
            .collect()
    }
}
