//! Default-attribute builders for the semantic entities of the schema.
//!
//! Every builder returns a node with its full attribute set present so that
//! downstream consumers never see missing keys, matching the node-model
//! contract: absent data is an empty value, not an absent field.

use super::{ModelNode, NodeType, Value};

/// Journal record: title, ISSN, publisher.
pub fn journal() -> ModelNode {
    let mut node = ModelNode::new(NodeType::Journal);
    node.set_text("title", "");
    node.set_text("issn", "");
    node.set_text("publisher", "");
    node
}

/// Article-level metadata record.
pub fn article_record() -> ModelNode {
    let mut node = ModelNode::new(NodeType::ArticleRecord);
    node.set_text("title", "");
    node.set_text("doi", "");
    node.set_text("volume", "");
    node.set_text("issue", "");
    node.set_text("fpage", "");
    node.set_text("lpage", "");
    node.set_text("elocation-id", "");
    node.set_str("pub-date", "");
    node.attrs.insert("correspondence", Value::StrList(Vec::new()));
    node
}

/// Contributor (author, editor) with affiliation references.
pub fn contributor() -> ModelNode {
    let mut node = ModelNode::new(NodeType::Contributor);
    node.set_text("surname", "");
    node.set_text("given-names", "");
    node.set_bool("corresponding", false);
    node.set_refs("affiliations", Vec::new());
    node
}

/// Affiliation: institution and place.
pub fn affiliation() -> ModelNode {
    let mut node = ModelNode::new(NodeType::Affiliation);
    node.set_text("institution", "");
    node.set_text("city", "");
    node.set_text("country", "");
    node
}

/// Bibliography item copied from a `ref` element.
pub fn reference() -> ModelNode {
    let mut node = ModelNode::new(NodeType::Reference);
    node.set_str("label", "");
    node.attrs.insert("authors", Value::StrList(Vec::new()));
    node.set_text("title", "");
    node.set_text("source", "");
    node.set_str("year", "");
    node.set_str("volume", "");
    node.set_str("fpage", "");
    node.set_str("lpage", "");
    node.set_str("doi", "");
    node.set_str("publisher", "");
    node
}

/// Review-comment annotation. `target` is filled by the materializer; the
/// offset attributes are only present for in-text anchors.
pub fn comment(comment_id: &str, text: &str) -> ModelNode {
    let mut node = ModelNode::new(NodeType::Comment);
    node.set_str("source-id", comment_id);
    node.set_str("text", text);
    node.set_ref("target", "");
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_fill_defaults() {
        let c = contributor();
        assert_eq!(c.get_str("surname"), Some(""));
        assert_eq!(
            c.attrs.get("affiliations"),
            Some(&Value::RefList(Vec::new()))
        );

        let r = reference();
        assert_eq!(r.get_str("doi"), Some(""));
        assert!(matches!(r.attrs.get("authors"), Some(Value::StrList(v)) if v.is_empty()));
    }
}
