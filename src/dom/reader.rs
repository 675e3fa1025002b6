//! XML document reading (quick-xml events into the arena DOM).

use quick_xml::Reader;
use quick_xml::events::Event;

use super::{Attribute, Dom, DomId};
use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding, strip_bom};

/// Parse an XML document into a [`Dom`].
///
/// Namespaced names keep their prefix (`mml:math`, `xlink:href`); JATS rules
/// match on the prefixed form. Character and entity references are resolved
/// into text. Whitespace-only text runs containing a newline (pretty-printer
/// indentation) are dropped at the start and end of an element and collapse
/// to a single space between sibling content.
pub fn parse_xml(bytes: &[u8]) -> Result<Dom> {
    let encoding = extract_xml_encoding(bytes).map(str::to_owned);
    let content = decode_text(strip_bom(bytes), encoding.as_deref());

    let mut reader = Reader::from_str(&content);
    let mut dom = Dom::new();
    let mut stack: Vec<DomId> = vec![dom.document()];
    // Indentation run waiting to become a single separating space, kept only
    // if more content follows in the same parent.
    let mut pending_space = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let parent = *stack.last().unwrap_or(&dom.document());
                if std::mem::take(&mut pending_space) {
                    dom.append_text(parent, " ");
                }
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = read_attributes(&e);
                let id = dom.create_element(&tag, attrs);
                dom.append(parent, id);
                stack.push(id);
            }
            Ok(Event::Empty(e)) => {
                let parent = *stack.last().unwrap_or(&dom.document());
                if std::mem::take(&mut pending_space) {
                    dom.append_text(parent, " ");
                }
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = read_attributes(&e);
                let id = dom.create_element(&tag, attrs);
                dom.append(parent, id);
            }
            Ok(Event::End(_)) => {
                pending_space = false;
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(e.as_ref()).into_owned();
                let parent = *stack.last().unwrap_or(&dom.document());
                if is_indentation(&raw) {
                    // Preceding content exists; whether anything follows is
                    // decided at the next event.
                    pending_space = dom.get(parent).is_some_and(|n| n.last_child.is_some());
                    continue;
                }
                if std::mem::take(&mut pending_space) {
                    dom.append_text(parent, " ");
                }
                dom.append_text(parent, &raw);
            }
            Ok(Event::CData(e)) => {
                let raw = String::from_utf8_lossy(e.as_ref()).into_owned();
                let parent = *stack.last().unwrap_or(&dom.document());
                if std::mem::take(&mut pending_space) {
                    dom.append_text(parent, " ");
                }
                dom.append_text(parent, &raw);
            }
            Ok(Event::GeneralRef(e)) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    let parent = *stack.last().unwrap_or(&dom.document());
                    if std::mem::take(&mut pending_space) {
                        dom.append_text(parent, " ");
                    }
                    dom.append_text(parent, &resolved);
                }
            }
            Ok(Event::PI(e)) => {
                let parent = *stack.last().unwrap_or(&dom.document());
                if std::mem::take(&mut pending_space) {
                    dom.append_text(parent, " ");
                }
                let target = String::from_utf8_lossy(e.target()).into_owned();
                let data = String::from_utf8_lossy(e.content()).into_owned();
                let id = dom.create_pi(target, data);
                dom.append(parent, id);
            }
            Ok(Event::Comment(e)) => {
                pending_space = false;
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                let id = dom.create_comment(text);
                let parent = *stack.last().unwrap_or(&dom.document());
                dom.append(parent, id);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Xml(e)),
        }
    }

    Ok(dom)
}

fn read_attributes(e: &quick_xml::events::BytesStart<'_>) -> Vec<Attribute> {
    let mut attrs = Vec::new();
    for attr in e.attributes().flatten() {
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        attrs.push(Attribute { name, value });
    }
    attrs
}

/// Whitespace-only run containing a newline, i.e. pretty-printer output.
fn is_indentation(text: &str) -> bool {
    text.contains('\n') && text.chars().all(char::is_whitespace)
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;

    #[test]
    fn test_parse_basic_structure() {
        let xml = br#"<?xml version="1.0"?>
<article>
  <front><article-meta/></front>
  <body><sec id="s1"><p>Hello</p></sec></body>
</article>"#;

        let dom = parse_xml(xml).unwrap();
        let article = dom.find_by_tag(dom.document(), "article").unwrap();
        assert_eq!(dom.child_elements(article).len(), 2);

        let p = dom.find_by_tag(article, "p").unwrap();
        assert_eq!(dom.deep_text(p), "Hello");

        let sec = dom.find_by_tag(article, "sec").unwrap();
        assert_eq!(dom.attr(sec, "id"), Some("s1"));
    }

    #[test]
    fn test_parse_entities_and_char_refs() {
        let xml = b"<article><p>a &amp; b &#x2019;</p></article>";
        let dom = parse_xml(xml).unwrap();
        let p = dom.find_by_tag(dom.document(), "p").unwrap();
        assert_eq!(dom.deep_text(p), "a & b \u{2019}");
    }

    #[test]
    fn test_parse_processing_instruction() {
        let xml = br#"<article><p>x<?AuthorQuery id="aq1" queryText="check"?>y</p></article>"#;
        let dom = parse_xml(xml).unwrap();
        let p = dom.find_by_tag(dom.document(), "p").unwrap();

        let children: Vec<_> = dom.children(p).collect();
        assert_eq!(children.len(), 3);
        match &dom.get(children[1]).unwrap().data {
            NodeData::Pi { target, data } => {
                assert_eq!(target, "AuthorQuery");
                assert!(data.contains("queryText"));
            }
            other => panic!("expected PI, got {:?}", other),
        }
    }

    #[test]
    fn test_namespaced_attributes_keep_prefix() {
        let xml = br#"<article><graphic xlink:href="fig1.jpg"/></article>"#;
        let dom = parse_xml(xml).unwrap();
        let g = dom.find_by_tag(dom.document(), "graphic").unwrap();
        assert_eq!(dom.attr(g, "xlink:href"), Some("fig1.jpg"));
    }

    #[test]
    fn test_newline_between_inline_siblings_becomes_space() {
        let xml = b"<article><p><italic>a</italic>\n<bold>b</bold></p></article>";
        let dom = parse_xml(xml).unwrap();
        let p = dom.find_by_tag(dom.document(), "p").unwrap();
        assert_eq!(dom.deep_text(p), "a b");

        // Leading and trailing runs are still dropped
        let xml = b"<article><p>\n  <bold>b</bold>\n</p></article>";
        let dom = parse_xml(xml).unwrap();
        let p = dom.find_by_tag(dom.document(), "p").unwrap();
        assert_eq!(dom.deep_text(p), "b");
    }

    #[test]
    fn test_indentation_dropped_inline_spaces_kept() {
        let xml = b"<article>\n  <p>see <xref rid=\"r1\">1</xref> here</p>\n</article>";
        let dom = parse_xml(xml).unwrap();
        let p = dom.find_by_tag(dom.document(), "p").unwrap();
        assert_eq!(dom.deep_text(p), "see 1 here");
    }
}
