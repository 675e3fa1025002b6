//! The normalized document model.
//!
//! Converted articles are graphs of [`ModelNode`]s: a typed node name, a
//! globally unique identifier, a bag of typed attributes, and child nodes.
//! The [`encode`] function flattens a finished tree into the output
//! collection, replacing nesting with `children` reference lists.

pub mod schema;

use std::collections::BTreeMap;

/// A tag in the internal typed-document schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "kebab-case"))]
pub enum NodeType {
    // Structure
    Body,
    Section,
    Keywords,
    Supplementary,
    Heading,
    Paragraph,
    // Block content
    Figure,
    TableFigure,
    Table,
    TableRow,
    TableCell,
    Caption,
    Graphic,
    Footnote,
    Math,
    InlineFormula,
    List,
    ListItem,
    // Inline content
    Citation,
    ExternalLink,
    // Marks
    Bold,
    Italic,
    Underline,
    SmallCaps,
    Monospace,
    Superscript,
    Subscript,
    // Metadata entities
    Journal,
    ArticleRecord,
    Contributor,
    Affiliation,
    // Bibliography
    Bibliography,
    Reference,
    // Annotations
    Comment,
}

impl NodeType {
    /// Schema name of this node type; also the identifier prefix.
    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Body => "body",
            NodeType::Section => "section",
            NodeType::Keywords => "keywords",
            NodeType::Supplementary => "supplementary",
            NodeType::Heading => "heading",
            NodeType::Paragraph => "paragraph",
            NodeType::Figure => "figure",
            NodeType::TableFigure => "table-figure",
            NodeType::Table => "table",
            NodeType::TableRow => "table-row",
            NodeType::TableCell => "table-cell",
            NodeType::Caption => "caption",
            NodeType::Graphic => "graphic",
            NodeType::Footnote => "footnote",
            NodeType::Math => "math",
            NodeType::InlineFormula => "inline-formula",
            NodeType::List => "list",
            NodeType::ListItem => "list-item",
            NodeType::Citation => "citation",
            NodeType::ExternalLink => "external-link",
            NodeType::Bold => "bold",
            NodeType::Italic => "italic",
            NodeType::Underline => "underline",
            NodeType::SmallCaps => "small-caps",
            NodeType::Monospace => "monospace",
            NodeType::Superscript => "superscript",
            NodeType::Subscript => "subscript",
            NodeType::Journal => "journal",
            NodeType::ArticleRecord => "article-record",
            NodeType::Contributor => "contributor",
            NodeType::Affiliation => "affiliation",
            NodeType::Bibliography => "bibliography",
            NodeType::Reference => "reference",
            NodeType::Comment => "comment",
        }
    }

    /// Marks compose with the text run of their owning block; they carry
    /// offsets instead of content of their own.
    pub fn is_mark(&self) -> bool {
        matches!(
            self,
            NodeType::Bold
                | NodeType::Italic
                | NodeType::Underline
                | NodeType::SmallCaps
                | NodeType::Monospace
                | NodeType::Superscript
                | NodeType::Subscript
        )
    }
}

/// A typed attribute value.
///
/// The distinction between `Str` and `Text` matters: only `Text` fields are
/// scanned for comment tokens, and only `Ref`/`RefList` fields are rewritten
/// by the identifier normalizer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(untagged))]
pub enum Value {
    /// Plain string field (labels, types, URIs).
    Str(String),
    /// Text-bearing content field (may host comment tokens).
    Text(String),
    Int(i64),
    Bool(bool),
    /// Single cross-reference to another node's identifier.
    Ref(String),
    /// Multiple cross-references.
    RefList(Vec<String>),
    /// Plain string list (e.g. keyword terms).
    StrList(Vec<String>),
}

/// A typed node in the normalized document model.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct ModelNode {
    #[cfg_attr(feature = "cli", serde(rename = "type"))]
    pub node_type: NodeType,
    pub id: String,
    pub attrs: BTreeMap<&'static str, Value>,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    /// Create a node with no identifier and no attributes.
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            id: String::new(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_id(node_type: NodeType, id: impl Into<String>) -> Self {
        let mut node = Self::new(node_type);
        node.id = id.into();
        node
    }

    pub fn set_str(&mut self, key: &'static str, value: impl Into<String>) {
        self.attrs.insert(key, Value::Str(value.into()));
    }

    pub fn set_text(&mut self, key: &'static str, value: impl Into<String>) {
        self.attrs.insert(key, Value::Text(value.into()));
    }

    pub fn set_int(&mut self, key: &'static str, value: i64) {
        self.attrs.insert(key, Value::Int(value));
    }

    pub fn set_bool(&mut self, key: &'static str, value: bool) {
        self.attrs.insert(key, Value::Bool(value));
    }

    pub fn set_ref(&mut self, key: &'static str, value: impl Into<String>) {
        self.attrs.insert(key, Value::Ref(value.into()));
    }

    pub fn set_refs(&mut self, key: &'static str, values: Vec<String>) {
        self.attrs.insert(key, Value::RefList(values));
    }

    /// Get a string-ish attribute (`Str` or `Text`), if present.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.attrs.get(key) {
            Some(Value::Str(s)) | Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Visit every node in the subtree, depth first, mutably.
    pub fn visit_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut ModelNode),
    {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    /// Visit every node in the subtree, depth first.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&ModelNode),
    {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
}

/// Flatten a node tree into the output collection, document order.
///
/// Each node's inline children are replaced by a `children` reference list;
/// the children follow their parent in the output.
pub fn encode(root: &ModelNode) -> Vec<ModelNode> {
    let mut out = Vec::new();
    flatten_into(root, &mut out);
    out
}

fn flatten_into(node: &ModelNode, out: &mut Vec<ModelNode>) {
    let mut flat = node.clone();
    flat.children = Vec::new();
    if !node.children.is_empty() {
        let child_ids = node.children.iter().map(|c| c.id.clone()).collect();
        flat.attrs.insert("children", Value::RefList(child_ids));
    }
    out.push(flat);
    for child in &node.children {
        flatten_into(child, out);
    }
}
