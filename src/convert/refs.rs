//! Bibliography parsing and the references registry.
//!
//! Each `ref` element in the back-matter reference list is copied into a
//! bibliography-item node with a freshly generated internal identifier. The
//! registry keeps the source-id ↔ internal-id association both ways: the
//! forward map seeds the identifier normalizer so body citations resolve,
//! and the per-item comment lists collect tokens found inside reference
//! text (those comments have no offset concept and are emitted as
//! whole-field annotations during materialization).

use std::collections::HashMap;

use memchr::memmem;

use crate::convert::comments::TokenRecord;
use crate::dom::{Dom, DomId};
use crate::model::{ModelNode, NodeType, Value, schema};
use crate::util::{IdGenerator, collapse_whitespace};

/// Bidirectional map of source document ids to internal bibliography ids,
/// plus per-item comment token lists.
#[derive(Default)]
pub struct RefRegistry {
    by_source: HashMap<String, String>,
    by_internal: HashMap<String, String>,
    /// `(internal item id, token)` pairs found in reference text.
    pub comments: Vec<(String, String)>,
}

impl RefRegistry {
    pub fn internal_id(&self, source_id: &str) -> Option<&str> {
        self.by_source.get(source_id).map(String::as_str)
    }

    pub fn source_id(&self, internal_id: &str) -> Option<&str> {
        self.by_internal.get(internal_id).map(String::as_str)
    }

    /// The forward map, used to seed the identifier normalizer.
    pub fn seed_map(&self) -> HashMap<String, String> {
        self.by_source.clone()
    }

    fn record(&mut self, source_id: String, internal_id: String) {
        self.by_internal
            .insert(internal_id.clone(), source_id.clone());
        self.by_source.insert(source_id, internal_id);
    }
}

/// Parse the reference list into a bibliography container node and its
/// items, building the registry as a side effect.
pub fn parse_bibliography(
    dom: &Dom,
    article: DomId,
    tokens: &[TokenRecord],
    idgen: &mut IdGenerator,
    registry: &mut RefRegistry,
) -> ModelNode {
    let mut bib = ModelNode::new(NodeType::Bibliography);
    bib.id = idgen.generate(NodeType::Bibliography.name());

    let Some(back) = dom
        .children(article)
        .find(|&c| dom.tag(c) == Some("back"))
    else {
        return bib;
    };
    let Some(ref_list) = dom.find_by_tag(back, "ref-list") else {
        return bib;
    };

    for ref_el in dom.find_all_by_tag(ref_list, "ref") {
        let internal_id = idgen.generate(NodeType::Reference.name());
        if let Some(source_id) = dom.attr(ref_el, "id") {
            registry.record(source_id.to_string(), internal_id.clone());
        }

        let mut item = build_item(dom, ref_el, tokens, &internal_id, registry);
        item.id = internal_id;
        bib.children.push(item);
    }

    bib
}

/// Copy citation fields from a `ref` element into a bibliography item.
fn build_item(
    dom: &Dom,
    ref_el: DomId,
    tokens: &[TokenRecord],
    internal_id: &str,
    registry: &mut RefRegistry,
) -> ModelNode {
    let mut item = schema::reference();

    let citation = dom
        .children(ref_el)
        .find(|&c| matches!(dom.tag(c), Some("element-citation") | Some("mixed-citation")))
        .unwrap_or(ref_el);

    if let Some(label) = dom
        .children(ref_el)
        .find(|&c| dom.tag(c) == Some("label"))
    {
        item.set_str("label", field_text(dom, label, tokens, internal_id, registry));
    }

    let mut authors = Vec::new();
    for name in dom.find_all_by_tag(citation, "name") {
        let surname = dom
            .find_by_tag(name, "surname")
            .map(|n| collapse_whitespace(dom.deep_text(n).trim()))
            .unwrap_or_default();
        let given = dom
            .find_by_tag(name, "given-names")
            .map(|n| collapse_whitespace(dom.deep_text(n).trim()))
            .unwrap_or_default();
        if given.is_empty() {
            authors.push(surname);
        } else {
            authors.push(format!("{}, {}", surname, given));
        }
    }
    item.attrs.insert("authors", Value::StrList(authors));

    for (key, tag) in [
        ("year", "year"),
        ("volume", "volume"),
        ("fpage", "fpage"),
        ("lpage", "lpage"),
        ("publisher", "publisher-name"),
    ] {
        if let Some(el) = dom.find_by_tag(citation, tag) {
            item.set_str(key, field_text(dom, el, tokens, internal_id, registry));
        }
    }

    // Text-bearing fields
    if let Some(title) = dom.find_by_tag(citation, "article-title") {
        item.set_text("title", field_text(dom, title, tokens, internal_id, registry));
    }
    if let Some(source) = dom.find_by_tag(citation, "source") {
        item.set_text(
            "source",
            field_text(dom, source, tokens, internal_id, registry),
        );
    }

    for pub_id in dom.find_all_by_tag(citation, "pub-id") {
        if dom.attr(pub_id, "pub-id-type") == Some("doi") {
            item.set_str("doi", field_text(dom, pub_id, tokens, internal_id, registry));
        }
    }

    item
}

/// Deep text of a field with comment tokens stripped out and recorded
/// against the owning item.
fn field_text(
    dom: &Dom,
    el: DomId,
    tokens: &[TokenRecord],
    internal_id: &str,
    registry: &mut RefRegistry,
) -> String {
    let mut text = collapse_whitespace(dom.deep_text(el).trim());
    loop {
        let Some((pos, token_len, token)) = tokens.iter().find_map(|record| {
            memmem::find(text.as_bytes(), record.token.as_bytes())
                .map(|pos| (pos, record.token.len(), record.token.clone()))
        }) else {
            break;
        };
        text.replace_range(pos..pos + token_len, "");
        registry.comments.push((internal_id.to_string(), token));
    }
    text.trim().to_string()
}
