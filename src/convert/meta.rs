//! Metadata field extraction: journal, article record, contributors,
//! affiliations, counts.
//!
//! Plain text copying with no structural ambiguity. Absent elements produce
//! empty fields, never errors; only malformed count values warrant a
//! warning. Fields copied from document text are stored as text-bearing
//! values, so comment markers inside them resolve like any other content.

use crate::dom::{Dom, DomId};
use crate::model::{ModelNode, Value, schema};
use crate::util::collapse_whitespace;

/// Extract all metadata nodes from `front`, in output order: journal,
/// article record, affiliations, contributors.
pub fn extract_metadata(
    dom: &Dom,
    front: DomId,
    warnings: &mut Vec<String>,
) -> Vec<ModelNode> {
    let mut nodes = Vec::new();

    nodes.push(extract_journal(dom, front));

    let meta = dom.find_by_tag(front, "article-meta");
    if let Some(meta) = meta {
        nodes.push(extract_article_record(dom, meta, warnings));
        for aff in dom.find_all_by_tag(meta, "aff") {
            nodes.push(extract_affiliation(dom, aff));
        }
        for contrib in dom.find_all_by_tag(meta, "contrib") {
            nodes.push(extract_contributor(dom, contrib));
        }
    } else {
        nodes.push(schema::article_record());
    }

    nodes
}

fn text_of(dom: &Dom, parent: DomId, tag: &str) -> String {
    dom.find_by_tag(parent, tag)
        .map(|el| collapse_whitespace(dom.deep_text(el).trim()))
        .unwrap_or_default()
}

fn extract_journal(dom: &Dom, front: DomId) -> ModelNode {
    let mut journal = schema::journal();
    if let Some(journal_meta) = dom.find_by_tag(front, "journal-meta") {
        journal.set_text("title", text_of(dom, journal_meta, "journal-title"));
        journal.set_text("issn", text_of(dom, journal_meta, "issn"));
        journal.set_text("publisher", text_of(dom, journal_meta, "publisher-name"));
        if let Some(id) = dom.attr(journal_meta, "id") {
            journal.id = id.to_string();
        }
    }
    journal
}

fn extract_article_record(dom: &Dom, meta: DomId, warnings: &mut Vec<String>) -> ModelNode {
    let mut record = schema::article_record();

    record.set_text("title", text_of(dom, meta, "article-title"));
    record.set_text("volume", text_of(dom, meta, "volume"));
    record.set_text("issue", text_of(dom, meta, "issue"));
    record.set_text("fpage", text_of(dom, meta, "fpage"));
    record.set_text("lpage", text_of(dom, meta, "lpage"));
    record.set_text("elocation-id", text_of(dom, meta, "elocation-id"));

    for article_id in dom.find_all_by_tag(meta, "article-id") {
        if dom.attr(article_id, "pub-id-type") == Some("doi") {
            record.set_text("doi", collapse_whitespace(dom.deep_text(article_id).trim()));
        }
    }

    if let Some(pub_date) = dom.find_by_tag(meta, "pub-date") {
        record.set_str("pub-date", extract_date(dom, pub_date));
    }

    let mut correspondence = Vec::new();
    if let Some(notes) = dom.find_by_tag(meta, "author-notes") {
        for corresp in dom.find_all_by_tag(notes, "corresp") {
            let text = collapse_whitespace(dom.deep_text(corresp).trim());
            if !text.is_empty() {
                correspondence.push(text);
            }
        }
    }
    record.attrs.insert("correspondence", Value::StrList(correspondence));

    extract_counts(dom, meta, &mut record, warnings);

    record
}

/// Assemble an ISO-8601 date from year/month/day children; partial dates
/// keep whatever precision the source has.
fn extract_date(dom: &Dom, pub_date: DomId) -> String {
    let year = text_of(dom, pub_date, "year");
    if year.is_empty() {
        return String::new();
    }
    let mut date = year;
    let month = text_of(dom, pub_date, "month");
    if let Ok(m) = month.parse::<u32>() {
        date.push_str(&format!("-{:02}", m));
        let day = text_of(dom, pub_date, "day");
        if let Ok(d) = day.parse::<u32>() {
            date.push_str(&format!("-{:02}", d));
        }
    }
    date
}

/// Copy the counts block. A malformed count value is reported and skipped.
fn extract_counts(dom: &Dom, meta: DomId, record: &mut ModelNode, warnings: &mut Vec<String>) {
    let Some(counts) = dom.find_by_tag(meta, "counts") else {
        return;
    };
    for (key, tag) in [
        ("fig-count", "fig-count"),
        ("table-count", "table-count"),
        ("ref-count", "ref-count"),
        ("page-count", "page-count"),
    ] {
        let Some(el) = dom.find_by_tag(counts, tag) else {
            continue;
        };
        let Some(raw) = dom.attr(el, "count") else {
            continue;
        };
        match raw.parse::<i64>() {
            Ok(value) => record.set_int(key, value),
            Err(_) => warnings.push(format!("malformed {} value '{}'; skipped", tag, raw)),
        }
    }
}

fn extract_affiliation(dom: &Dom, aff: DomId) -> ModelNode {
    let mut node = schema::affiliation();
    if let Some(id) = dom.attr(aff, "id") {
        node.id = id.to_string();
    }
    node.set_text("institution", text_of(dom, aff, "institution"));
    node.set_text("city", text_of(dom, aff, "city"));
    node.set_text("country", text_of(dom, aff, "country"));
    node
}

fn extract_contributor(dom: &Dom, contrib: DomId) -> ModelNode {
    let mut node = schema::contributor();
    if let Some(id) = dom.attr(contrib, "id") {
        node.id = id.to_string();
    }
    node.set_text("surname", text_of(dom, contrib, "surname"));
    node.set_text("given-names", text_of(dom, contrib, "given-names"));
    node.set_bool("corresponding", dom.attr(contrib, "corresp") == Some("yes"));

    let affs: Vec<String> = dom
        .find_all_by_tag(contrib, "xref")
        .into_iter()
        .filter(|&x| dom.attr(x, "ref-type") == Some("aff"))
        .filter_map(|x| dom.attr(x, "rid"))
        .map(str::to_owned)
        .collect();
    node.set_refs("affiliations", affs);

    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_xml;
    use crate::model::{NodeType, Value};

    const FRONT: &[u8] = b"<article><front>\
<journal-meta><journal-title-group><journal-title>Acta Examples</journal-title>\
</journal-title-group><issn>1234-5678</issn>\
<publisher><publisher-name>Example Press</publisher-name></publisher></journal-meta>\
<article-meta>\
<article-id pub-id-type=\"doi\">10.1000/example</article-id>\
<title-group><article-title>A Study of Things</article-title></title-group>\
<contrib-group>\
<contrib contrib-type=\"author\" corresp=\"yes\" id=\"c1\">\
<name><surname>Doe</surname><given-names>Jane</given-names></name>\
<xref ref-type=\"aff\" rid=\"aff1\"/></contrib>\
</contrib-group>\
<aff id=\"aff1\"><institution>Example University</institution>\
<city>Springfield</city><country>US</country></aff>\
<pub-date pub-type=\"epub\"><day>5</day><month>3</month><year>2021</year></pub-date>\
<volume>7</volume><issue>2</issue><fpage>101</fpage><lpage>110</lpage>\
<counts><fig-count count=\"3\"/><page-count count=\"ten\"/></counts>\
</article-meta></front><body/></article>";

    fn front(dom: &Dom) -> DomId {
        let article = dom.find_by_tag(dom.document(), "article").unwrap();
        dom.find_by_tag(article, "front").unwrap()
    }

    #[test]
    fn test_journal_and_article_fields() {
        let dom = parse_xml(FRONT).unwrap();
        let mut warnings = Vec::new();
        let nodes = extract_metadata(&dom, front(&dom), &mut warnings);

        let journal = &nodes[0];
        assert_eq!(journal.node_type, NodeType::Journal);
        assert_eq!(journal.get_str("title"), Some("Acta Examples"));
        assert_eq!(journal.get_str("issn"), Some("1234-5678"));
        assert_eq!(journal.get_str("publisher"), Some("Example Press"));

        let record = &nodes[1];
        assert_eq!(record.node_type, NodeType::ArticleRecord);
        assert_eq!(record.get_str("title"), Some("A Study of Things"));
        assert_eq!(record.get_str("doi"), Some("10.1000/example"));
        assert_eq!(record.get_str("volume"), Some("7"));
        assert_eq!(record.get_str("pub-date"), Some("2021-03-05"));
    }

    #[test]
    fn test_contributor_and_affiliation() {
        let dom = parse_xml(FRONT).unwrap();
        let mut warnings = Vec::new();
        let nodes = extract_metadata(&dom, front(&dom), &mut warnings);

        let aff = nodes
            .iter()
            .find(|n| n.node_type == NodeType::Affiliation)
            .unwrap();
        assert_eq!(aff.id, "aff1");
        assert_eq!(aff.get_str("institution"), Some("Example University"));

        let contrib = nodes
            .iter()
            .find(|n| n.node_type == NodeType::Contributor)
            .unwrap();
        assert_eq!(contrib.get_str("surname"), Some("Doe"));
        assert_eq!(contrib.attrs.get("corresponding"), Some(&Value::Bool(true)));
        assert_eq!(
            contrib.attrs.get("affiliations"),
            Some(&Value::RefList(vec!["aff1".to_string()]))
        );
    }

    #[test]
    fn test_malformed_count_warns_and_skips() {
        let dom = parse_xml(FRONT).unwrap();
        let mut warnings = Vec::new();
        let nodes = extract_metadata(&dom, front(&dom), &mut warnings);

        let record = &nodes[1];
        assert_eq!(record.attrs.get("fig-count"), Some(&Value::Int(3)));
        assert!(!record.attrs.contains_key("page-count"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("page-count"));
    }

    #[test]
    fn test_partial_date() {
        let xml = b"<article><front><article-meta>\
<pub-date><year>2020</year></pub-date></article-meta></front></article>";
        let dom = parse_xml(xml).unwrap();
        let mut warnings = Vec::new();
        let nodes = extract_metadata(&dom, front(&dom), &mut warnings);
        assert_eq!(nodes[1].get_str("pub-date"), Some("2020"));
    }

    #[test]
    fn test_correspondence_from_author_notes() {
        let xml = b"<article><front><article-meta><author-notes>\
<corresp id=\"cor1\"><label>*</label>Correspondence: jane@example.edu</corresp>\
<corresp id=\"cor2\">Also: j.roe@example.org</corresp>\
</author-notes></article-meta></front></article>";
        let dom = parse_xml(xml).unwrap();
        let mut warnings = Vec::new();
        let nodes = extract_metadata(&dom, front(&dom), &mut warnings);

        assert_eq!(
            nodes[1].attrs.get("correspondence"),
            Some(&Value::StrList(vec![
                "*Correspondence: jane@example.edu".to_string(),
                "Also: j.roe@example.org".to_string(),
            ]))
        );
    }

    #[test]
    fn test_missing_author_notes_yields_empty_collection() {
        let dom = parse_xml(b"<article><front><article-meta/></front></article>").unwrap();
        let mut warnings = Vec::new();
        let nodes = extract_metadata(&dom, front(&dom), &mut warnings);

        assert_eq!(
            nodes[1].attrs.get("correspondence"),
            Some(&Value::StrList(Vec::new()))
        );
    }

    #[test]
    fn test_missing_metadata_yields_defaults() {
        let dom = parse_xml(b"<article><front/><body/></article>").unwrap();
        let mut warnings = Vec::new();
        let nodes = extract_metadata(&dom, front(&dom), &mut warnings);

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].get_str("title"), Some(""));
        assert_eq!(nodes[1].get_str("doi"), Some(""));
        assert!(warnings.is_empty());
    }
}
