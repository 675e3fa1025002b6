//! Embedded review comments: tokenization and materialization.
//!
//! Publishers embed review comments as processing instructions
//! (`<?AuthorQuery id="aq1" queryText="..."?>`) at the exact text position
//! they refer to. Converting text into model fields would lose that position,
//! so the pipeline runs in two halves: before anything else touches the tree,
//! each marker is replaced by a unique inline token that survives text
//! serialization as plain content; after the model is built and identifiers
//! are final, the tokens are located in the text-bearing fields, stripped,
//! and turned into offset-anchored comment nodes.

use memchr::memmem;

use crate::dom::{Dom, NodeData};
use crate::model::{ModelNode, NodeType, Value, schema};
use crate::util::IdGenerator;

/// Marker target recognized as a review comment.
pub const MARKER_TARGET: &str = "AuthorQuery";

/// One tokenized comment marker.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    /// Unique inline token standing in for the marker.
    pub token: String,
    /// The marker's own id (`id="..."` payload key).
    pub comment_id: String,
    /// The comment text (`queryText="..."` payload key).
    pub text: String,
}

// ============================================================================
// Tokenizer
// ============================================================================

/// Replace every comment marker in the tree with a unique inline token.
///
/// Traversal is breadth first; the returned records are in discovery order.
/// A marker missing either payload key is skipped silently. The marker node
/// stays in place with a blanked payload; the token text node is inserted
/// immediately before it.
pub fn tokenize_comments(dom: &mut Dom, idgen: &mut IdGenerator) -> Vec<TokenRecord> {
    let mut records = Vec::new();

    for id in dom.breadth_first(dom.document()) {
        let payload = match dom.get(id).map(|n| &n.data) {
            Some(NodeData::Pi { target, data }) if target == MARKER_TARGET => data.clone(),
            _ => continue,
        };

        let fields = parse_payload(&payload);
        let (Some(comment_id), Some(text)) = (fields.id, fields.query_text) else {
            continue;
        };

        let token = format!("@{}@", idgen.generate("query"));
        let text_node = dom.create_text(token.clone());
        dom.insert_before(id, text_node);
        if let Some(node) = dom.get_mut(id)
            && let NodeData::Pi { data, .. } = &mut node.data
        {
            data.clear();
        }

        records.push(TokenRecord {
            token,
            comment_id,
            text,
        });
    }

    records
}

struct MarkerPayload {
    id: Option<String>,
    query_text: Option<String>,
}

/// Parse the marker's `key="value"` payload encoding.
///
/// Values may contain backslash-escaped quotes. Unknown keys are ignored.
fn parse_payload(payload: &str) -> MarkerPayload {
    let mut out = MarkerPayload {
        id: None,
        query_text: None,
    };

    let mut chars = payload.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        // Key runs up to '='
        let mut key_end = start;
        for (i, c) in chars.by_ref() {
            if c == '=' {
                key_end = i;
                break;
            }
            key_end = i + c.len_utf8();
        }
        let key = &payload[start..key_end];

        // Quoted value
        match chars.next() {
            Some((_, '"')) => {}
            _ => break,
        }
        let mut value = String::new();
        let mut escaped = false;
        let mut closed = false;
        for (_, c) in chars.by_ref() {
            if escaped {
                value.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                closed = true;
                break;
            } else {
                value.push(c);
            }
        }
        if !closed {
            break;
        }

        match key {
            "id" => out.id = Some(value),
            "queryText" => out.query_text = Some(value),
            _ => {}
        }
    }

    out
}

// ============================================================================
// Materializer
// ============================================================================

/// Strip tokens from every text-bearing field of the finished graph and emit
/// one comment node per token, anchored at the token's offset.
///
/// Tokens are matched and removed one at a time in ascending offset order per
/// field, so each recorded offset is valid in the field content as it stands
/// after all earlier removals. String-list entries and registry comments
/// (keyed by bibliography item) are emitted as whole-field annotations
/// without an offset.
pub fn materialize_comments(
    roots: &mut [ModelNode],
    records: &[TokenRecord],
    registry_comments: &[(String, String)],
    idgen: &mut IdGenerator,
) -> Vec<ModelNode> {
    let mut comments = Vec::new();

    for root in roots.iter_mut() {
        root.visit_mut(&mut |node| {
            if node.node_type == NodeType::Comment {
                return;
            }
            let node_id = node.id.clone();
            for (key, value) in node.attrs.iter_mut() {
                match value {
                    Value::Text(content) => {
                        for (offset, record) in strip_tokens(content, records) {
                            // Marks and inline nodes index into the content
                            // run; removing a token invalidates every offset
                            // past it.
                            if *key == "content" {
                                shift_offsets(&mut node.children, offset, record.token.len());
                            }
                            let mut comment = schema::comment(&record.comment_id, &record.text);
                            comment.id = idgen.generate(NodeType::Comment.name());
                            comment.set_ref("target", node_id.clone());
                            comment.set_str("path", *key);
                            comment.set_int("offset", offset as i64);
                            comments.push(comment);
                        }
                    }
                    // List entries are annotated whole, without an offset
                    Value::StrList(entries) => {
                        for entry in entries.iter_mut() {
                            for (_, record) in strip_tokens(entry, records) {
                                let mut comment =
                                    schema::comment(&record.comment_id, &record.text);
                                comment.id = idgen.generate(NodeType::Comment.name());
                                comment.set_ref("target", node_id.clone());
                                comment.set_str("path", *key);
                                comments.push(comment);
                            }
                        }
                    }
                    _ => {}
                }
            }
        });
    }

    for (item_id, token) in registry_comments {
        let Some(record) = records.iter().find(|r| &r.token == token) else {
            continue;
        };
        let mut comment = schema::comment(&record.comment_id, &record.text);
        comment.id = idgen.generate(NodeType::Comment.name());
        comment.set_ref("target", item_id.clone());
        comments.push(comment);
    }

    comments
}

/// Pull offset-carrying children back over a gap left by a token removal.
/// `removed_at` is the token's position at removal time; offsets at or past
/// the token's end move down by its length.
fn shift_offsets(children: &mut [ModelNode], removed_at: usize, removed_len: usize) {
    let cut = (removed_at + removed_len) as i64;
    for child in children {
        for key in ["start", "end"] {
            if let Some(Value::Int(offset)) = child.attrs.get_mut(key)
                && *offset >= cut
            {
                *offset -= removed_len as i64;
            }
        }
    }
}

/// Remove all known tokens from `content`, ascending offset order, one at a
/// time. Returns `(offset, record)` pairs in removal order, each offset being
/// the token's position at the moment it was removed.
fn strip_tokens<'a>(
    content: &mut String,
    records: &'a [TokenRecord],
) -> Vec<(usize, &'a TokenRecord)> {
    let mut found = Vec::new();

    loop {
        let mut earliest: Option<(usize, &TokenRecord)> = None;
        for record in records {
            if let Some(pos) = memmem::find(content.as_bytes(), record.token.as_bytes())
                && earliest.is_none_or(|(best, _)| pos < best)
            {
                earliest = Some((pos, record));
            }
        }

        let Some((pos, record)) = earliest else {
            break;
        };
        content.replace_range(pos..pos + record.token.len(), "");
        found.push((pos, record));
    }

    found
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_xml;

    fn records_for(tokens: &[(&str, &str, &str)]) -> Vec<TokenRecord> {
        tokens
            .iter()
            .map(|(token, id, text)| TokenRecord {
                token: token.to_string(),
                comment_id: id.to_string(),
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_parse_payload() {
        let p = parse_payload(r#"id="aq1" queryText="Please check""#);
        assert_eq!(p.id.as_deref(), Some("aq1"));
        assert_eq!(p.query_text.as_deref(), Some("Please check"));
    }

    #[test]
    fn test_parse_payload_escaped_quotes() {
        let p = parse_payload(r#"id="aq2" queryText="a \"quoted\" word""#);
        assert_eq!(p.query_text.as_deref(), Some(r#"a "quoted" word"#));
    }

    #[test]
    fn test_parse_payload_missing_key() {
        let p = parse_payload(r#"id="aq3""#);
        assert_eq!(p.id.as_deref(), Some("aq3"));
        assert!(p.query_text.is_none());
    }

    #[test]
    fn test_tokenize_inserts_token_before_marker() {
        let xml =
            br#"<article><p>before<?AuthorQuery id="aq1" queryText="check this"?>after</p></article>"#;
        let mut dom = parse_xml(xml).unwrap();
        let mut idgen = IdGenerator::with_seed(1);

        let records = tokenize_comments(&mut dom, &mut idgen);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].comment_id, "aq1");
        assert_eq!(records[0].text, "check this");

        let p = dom.find_by_tag(dom.document(), "p").unwrap();
        let text = dom.deep_text(p);
        assert_eq!(text, format!("before{}after", records[0].token));
    }

    #[test]
    fn test_tokenize_skips_incomplete_marker() {
        let xml = br#"<article><p><?AuthorQuery id="aq1"?>x</p></article>"#;
        let mut dom = parse_xml(xml).unwrap();
        let mut idgen = IdGenerator::with_seed(1);

        let records = tokenize_comments(&mut dom, &mut idgen);
        assert!(records.is_empty());

        let p = dom.find_by_tag(dom.document(), "p").unwrap();
        assert_eq!(dom.deep_text(p), "x");
    }

    #[test]
    fn test_tokenize_discovery_order_is_breadth_first() {
        let xml = br#"<article>
<p><b><?AuthorQuery id="deep" queryText="d"?></b></p>
<p><?AuthorQuery id="shallow" queryText="s"?></p>
</article>"#;
        let mut dom = parse_xml(xml).unwrap();
        let mut idgen = IdGenerator::with_seed(1);

        let records = tokenize_comments(&mut dom, &mut idgen);
        assert_eq!(records.len(), 2);
        // The shallower marker is discovered first under BFS
        assert_eq!(records[0].comment_id, "shallow");
        assert_eq!(records[1].comment_id, "deep");
    }

    #[test]
    fn test_strip_tokens_ascending_order() {
        let records = records_for(&[("@T1@", "aq1", "one"), ("@T2@", "aq2", "two")]);
        // T2 appears before T1 in the content; removal must still be ascending
        let mut content = "ab@T2@cdef@T1@gh".to_string();

        let found = strip_tokens(&mut content, &records);
        assert_eq!(content, "abcdefgh");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, 2);
        assert_eq!(found[0].1.comment_id, "aq2");
        // T1's offset is measured after T2 was removed
        assert_eq!(found[1].0, 6);
        assert_eq!(found[1].1.comment_id, "aq1");
    }

    #[test]
    fn test_strip_tokens_unknown_substring_untouched() {
        let records = records_for(&[("@T1@", "aq1", "one")]);
        let mut content = "x@UNKNOWN@y@T1@z".to_string();
        let found = strip_tokens(&mut content, &records);
        assert_eq!(content, "x@UNKNOWN@yz");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_materialize_anchors_comments() {
        let records = records_for(&[("@T1@", "aq1", "first"), ("@T2@", "aq2", "second")]);
        let mut root = ModelNode::with_id(NodeType::Body, "body-1");
        let mut p = ModelNode::with_id(NodeType::Paragraph, "paragraph-1");
        p.set_text("content", "before @T1@ middle @T2@ after");
        root.children.push(p);

        let mut idgen = IdGenerator::with_seed(5);
        let comments = materialize_comments(std::slice::from_mut(&mut root), &records, &[], &mut idgen);

        assert_eq!(
            root.children[0].get_str("content"),
            Some("before  middle  after")
        );
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].get_str("source-id"), Some("aq1"));
        assert_eq!(comments[0].attrs.get("offset"), Some(&Value::Int(7)));
        assert_eq!(
            comments[0].attrs.get("target"),
            Some(&Value::Ref("paragraph-1".to_string()))
        );
        assert_eq!(comments[1].get_str("source-id"), Some("aq2"));
        assert_eq!(comments[1].attrs.get("offset"), Some(&Value::Int(15)));
        assert!(comments[0].id.starts_with("comment-"));
        assert_ne!(comments[0].id, comments[1].id);
    }

    #[test]
    fn test_materialize_shifts_offsets_past_removed_token() {
        let records = records_for(&[("@T1@", "aq1", "check")]);
        let mut p = ModelNode::with_id(NodeType::Paragraph, "paragraph-1");
        p.set_text("content", "a@T1@b");

        let mut before = ModelNode::new(NodeType::Italic);
        before.set_int("start", 0);
        before.set_int("end", 1);
        let mut after = ModelNode::new(NodeType::Bold);
        after.set_int("start", 5);
        after.set_int("end", 6);
        p.children.push(before);
        p.children.push(after);

        let mut idgen = IdGenerator::with_seed(5);
        let comments =
            materialize_comments(std::slice::from_mut(&mut p), &records, &[], &mut idgen);

        assert_eq!(p.get_str("content"), Some("ab"));
        // The mark ending where the token began is untouched
        assert_eq!(p.children[0].attrs.get("start"), Some(&Value::Int(0)));
        assert_eq!(p.children[0].attrs.get("end"), Some(&Value::Int(1)));
        // The mark past the token moved back by the token's length
        assert_eq!(p.children[1].attrs.get("start"), Some(&Value::Int(1)));
        assert_eq!(p.children[1].attrs.get("end"), Some(&Value::Int(2)));
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].attrs.get("offset"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_materialize_strips_tokens_from_list_entries() {
        let records = records_for(&[("@T1@", "aq1", "check name")]);
        let mut item = ModelNode::with_id(NodeType::Reference, "reference-1");
        item.attrs.insert(
            "authors",
            Value::StrList(vec!["Jones, B.@T1@".to_string(), "Roe, J.".to_string()]),
        );

        let mut idgen = IdGenerator::with_seed(5);
        let comments =
            materialize_comments(std::slice::from_mut(&mut item), &records, &[], &mut idgen);

        assert_eq!(
            item.attrs.get("authors"),
            Some(&Value::StrList(vec![
                "Jones, B.".to_string(),
                "Roe, J.".to_string()
            ]))
        );
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].get_str("path"), Some("authors"));
        assert!(!comments[0].attrs.contains_key("offset"));
    }

    #[test]
    fn test_materialize_registry_comments_whole_field() {
        let records = records_for(&[("@T9@", "aq9", "bib note")]);
        let mut root = ModelNode::with_id(NodeType::Body, "body-1");
        let mut idgen = IdGenerator::with_seed(5);

        let registry = vec![("reference-abc".to_string(), "@T9@".to_string())];
        let comments = materialize_comments(std::slice::from_mut(&mut root), &records, &registry, &mut idgen);

        assert_eq!(comments.len(), 1);
        assert_eq!(
            comments[0].attrs.get("target"),
            Some(&Value::Ref("reference-abc".to_string()))
        );
        assert!(!comments[0].attrs.contains_key("offset"));
    }
}

#[cfg(test)]
mod props {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// Stripping restores the untokenized text, and each recorded anchor
        /// equals the token's position in that text, in ascending order.
        #[test]
        fn prop_strip_tokens_anchors(
            base in "[a-z ]{0,40}",
            mut cuts in proptest::collection::vec(0usize..=40, 0..4),
        ) {
            for cut in &mut cuts {
                *cut = (*cut).min(base.len());
            }
            cuts.sort_unstable();

            let records: Vec<TokenRecord> = (0..cuts.len())
                .map(|i| TokenRecord {
                    token: format!("@query-{i:08x}@"),
                    comment_id: format!("aq{i}"),
                    text: String::new(),
                })
                .collect();

            // Insert back to front so earlier positions stay valid
            let mut content = base.clone();
            for (record, cut) in records.iter().zip(&cuts).rev() {
                content.insert_str(*cut, &record.token);
            }

            let found = strip_tokens(&mut content, &records);
            prop_assert_eq!(&content, &base);

            let offsets: Vec<usize> = found.iter().map(|(offset, _)| *offset).collect();
            prop_assert_eq!(&offsets, &cuts);
        }
    }
}
