//! JATS article conversion pipeline.
//!
//! The stages run in a fixed order, each consuming the previous stage's
//! output:
//!
//! 1. Parse the XML into a mutable element tree.
//! 2. Replace review-comment markers with inline tokens ([`comments`]).
//! 3. Rewrite the tree into canonical shape ([`restructure`]).
//! 4. Extract metadata ([`meta`]) and the bibliography ([`refs`]).
//! 5. Parse the body through the rule table ([`rules`]).
//! 6. Assign fresh identifiers and remap references ([`ids`]).
//! 7. Strip tokens from the finished graph and emit comment nodes.
//!
//! An input without an `article` or `front` element is rejected; everything
//! else degrades to warnings and empty fields.

mod comments;
mod ids;
mod meta;
mod refs;
mod restructure;
mod rules;

use crate::dom::parse_xml;
use crate::error::{Error, Result};
use crate::model::{self, ModelNode};
use crate::util::IdGenerator;

pub use comments::{MARKER_TARGET, TokenRecord};
pub use refs::RefRegistry;

/// Result of a conversion: the flattened node list plus any warnings
/// accumulated along the way. Warnings never abort the pipeline.
#[derive(Debug)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Conversion {
    pub nodes: Vec<ModelNode>,
    pub warnings: Vec<String>,
}

/// Convert a JATS article into the typed node model.
///
/// Accepts raw bytes; the character encoding is detected from the XML
/// declaration with a Windows-1252 fallback for legacy exports.
pub fn convert_article(xml: &[u8]) -> Result<Conversion> {
    let mut dom = parse_xml(xml)?;

    let article = dom
        .find_by_tag(dom.document(), "article")
        .ok_or_else(|| Error::MissingElement("article".to_string()))?;
    let front = dom
        .children(article)
        .find(|&c| dom.tag(c) == Some("front"))
        .ok_or_else(|| Error::MissingElement("front".to_string()))?;

    let mut idgen = IdGenerator::new();
    let mut warnings = Vec::new();

    let tokens = comments::tokenize_comments(&mut dom, &mut idgen);

    restructure::restructure(&mut dom);

    let mut roots = meta::extract_metadata(&dom, front, &mut warnings);

    let mut registry = RefRegistry::default();
    let bibliography =
        refs::parse_bibliography(&dom, article, &tokens, &mut idgen, &mut registry);

    roots.push(rules::parse_body(&dom, article));
    roots.push(bibliography);

    // Bibliography items already carry internal ids; the registry seeds the
    // replacement map so citations pointing at source ids resolve.
    warnings.extend(ids::normalize_ids(&mut roots, registry.seed_map(), &mut idgen));

    let comment_nodes =
        comments::materialize_comments(&mut roots, &tokens, &registry.comments, &mut idgen);

    let mut nodes = Vec::new();
    for root in &roots {
        nodes.extend(model::encode(root));
    }
    nodes.extend(comment_nodes);

    Ok(Conversion { nodes, warnings })
}
