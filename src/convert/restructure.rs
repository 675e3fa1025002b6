//! Structural rewrites that bring a raw JATS tree into the canonical shape
//! the rule-based parser expects.
//!
//! Seven ordered passes over one exclusively-owned tree. Each pass is
//! idempotent on its own output and treats absent elements as a no-op; the
//! ordering matters (grouping must see consolidated footnotes, keyword
//! promotion must run after grouping so the synthesized sections land at the
//! top level).

use crate::dom::{Dom, DomId};

/// Apply all structural rewrites to the document.
pub fn restructure(dom: &mut Dom) {
    let Some(article) = dom.find_by_tag(dom.document(), "article") else {
        return;
    };

    if let Some(body) = child_by_tag(dom, article, "body") {
        ensure_sections(dom, body);
    }
    relocate_captions(dom, article);
    normalize_tables(dom, article);
    consolidate_footnotes(dom, article);
    order_table_footnotes(dom, article);
    group_sections(dom, article);
    promote_meta_sections(dom, article);
}

fn child_by_tag(dom: &Dom, parent: DomId, tag: &str) -> Option<DomId> {
    dom.children(parent).find(|&c| dom.tag(c) == Some(tag))
}

// ============================================================================
// 1. Ensure every block of body content is inside a section
// ============================================================================

/// Ungrouped content never floats outside a section: leading non-section
/// children are moved into a synthesized section, later ones are appended to
/// the most recently seen section.
fn ensure_sections(dom: &mut Dom, body: DomId) {
    let children: Vec<_> = dom.children(body).collect();
    let mut current: Option<DomId> = None;

    for child in children {
        if dom.tag(child) == Some("sec") {
            current = Some(child);
            continue;
        }
        let sec = match current {
            Some(sec) => sec,
            None => {
                let sec = dom.create_element("sec", vec![]);
                dom.insert_before(child, sec);
                current = Some(sec);
                sec
            }
        };
        dom.append(sec, child);
    }
}

// ============================================================================
// 2. Captions trail their figure/table content
// ============================================================================

fn relocate_captions(dom: &mut Dom, article: DomId) {
    for caption in dom.find_all_by_tag(article, "caption") {
        let parent = dom.get(caption).map(|n| n.parent).unwrap_or(DomId::NONE);
        if parent.is_some() {
            dom.append(parent, caption);
        }
    }
}

// ============================================================================
// 3. Loose table columns get a colgroup
// ============================================================================

fn normalize_tables(dom: &mut Dom, article: DomId) {
    for table in dom.find_all_by_tag(article, "table") {
        if child_by_tag(dom, table, "colgroup").is_some() {
            continue;
        }
        let cols: Vec<_> = dom
            .children(table)
            .filter(|&c| dom.tag(c) == Some("col"))
            .collect();
        let Some(&first) = cols.first() else {
            continue;
        };

        let colgroup = dom.create_element("colgroup", vec![]);
        dom.insert_before(first, colgroup);
        for col in cols {
            dom.append(colgroup, col);
        }
    }
}

// ============================================================================
// 4. Footnote consolidation
// ============================================================================

/// Untyped footnotes in the backmatter are collected into one group inside an
/// endnotes section (synthesized as the second child of `back`, the first
/// being reserved for its title). Footnotes with a semantic `fn-type` become
/// standalone sections typed after it, keeping a paragraph tagged as the
/// footnote's own title.
fn consolidate_footnotes(dom: &mut Dom, article: DomId) {
    let Some(back) = child_by_tag(dom, article, "back") else {
        return;
    };

    let fns: Vec<_> = dom
        .find_all_by_tag(back, "fn")
        .into_iter()
        .filter(|&f| !inside_table_foot(dom, f))
        .collect();
    if fns.is_empty() {
        return;
    }

    let mut untyped = Vec::new();
    for fn_el in fns {
        match dom.attr(fn_el, "fn-type").map(str::to_owned) {
            Some(fn_type) => promote_typed_footnote(dom, back, fn_el, &fn_type),
            None => untyped.push(fn_el),
        }
    }

    if !untyped.is_empty() {
        let group = endnotes_group(dom, back);
        for fn_el in untyped {
            dom.append(group, fn_el);
        }
    }

    // Groups emptied by the moves contribute nothing; drop them
    for group in dom.find_all_by_tag(back, "fn-group") {
        if dom.child_elements(group).is_empty() {
            dom.detach(group);
        }
    }
}

fn inside_table_foot(dom: &Dom, mut id: DomId) -> bool {
    while id.is_some() {
        if dom.tag(id) == Some("table-wrap-foot") {
            return true;
        }
        id = dom.get(id).map(|n| n.parent).unwrap_or(DomId::NONE);
    }
    false
}

/// Find (or synthesize) the footnote group of the endnotes section.
fn endnotes_group(dom: &mut Dom, back: DomId) -> DomId {
    for sec in dom.find_all_by_tag(back, "sec") {
        if dom.attr(sec, "sec-type") == Some("endnotes")
            && let Some(group) = child_by_tag(dom, sec, "fn-group")
        {
            return group;
        }
    }

    let sec = dom.create_element("sec", vec![]);
    dom.set_attr(sec, "sec-type", "endnotes");
    let title = dom.create_element("title", vec![]);
    dom.append_text(title, "Endnotes");
    dom.append(sec, title);
    let group = dom.create_element("fn-group", vec![]);
    dom.append(sec, group);

    let children: Vec<_> = dom.children(back).collect();
    if children.len() >= 2 {
        dom.insert_before(children[1], sec);
    } else {
        dom.append(back, sec);
    }
    group
}

fn promote_typed_footnote(dom: &mut Dom, back: DomId, fn_el: DomId, fn_type: &str) {
    let sec = dom.create_element("sec", vec![]);
    dom.set_attr(sec, "sec-type", fn_type);
    if let Some(id) = dom.attr(fn_el, "id").map(str::to_owned) {
        dom.set_attr(sec, "id", &id);
    }

    let children: Vec<_> = dom.children(fn_el).collect();
    for child in children {
        if dom.tag(child) == Some("p") && dom.attr(child, "specific-use") == Some("title") {
            let title = dom.create_element("title", vec![]);
            let inner: Vec<_> = dom.children(child).collect();
            for grandchild in inner {
                dom.append(title, grandchild);
            }
            dom.prepend(sec, title);
        } else {
            dom.append(sec, child);
        }
    }

    dom.detach(fn_el);
    dom.append(back, sec);
}

// ============================================================================
// 5. Table footnotes: cited before uncited, source order preserved
// ============================================================================

fn order_table_footnotes(dom: &mut Dom, article: DomId) {
    for wrap in dom.find_all_by_tag(article, "table-wrap") {
        let Some(foot) = dom.find_by_tag(wrap, "table-wrap-foot") else {
            continue;
        };

        // Citation order within the table content, foot excluded
        let mut cited = Vec::new();
        for xref in dom.find_all_by_tag(wrap, "xref") {
            if inside_table_foot(dom, xref) {
                continue;
            }
            if let Some(rid) = dom.attr(xref, "rid")
                && !cited.iter().any(|c| c == rid)
            {
                cited.push(rid.to_string());
            }
        }

        // Footnotes sit either in fn-groups or directly under the foot
        let mut containers = dom.find_all_by_tag(foot, "fn-group");
        containers.push(foot);
        for group in containers {
            let fns: Vec<_> = dom
                .children(group)
                .filter(|&c| dom.tag(c) == Some("fn"))
                .collect();

            // Stable partition: cited footnotes first, ties keep source order
            let is_cited = |dom: &Dom, f: DomId| {
                dom.attr(f, "id")
                    .is_some_and(|id| cited.iter().any(|c| c == id))
            };
            let mut ordered: Vec<_> = fns.iter().copied().filter(|&f| is_cited(dom, f)).collect();
            ordered.extend(fns.iter().copied().filter(|&f| !is_cited(dom, f)));

            for f in ordered {
                dom.append(group, f);
            }
        }
    }
}

// ============================================================================
// 6. Top-level grouping: body / abstracts / backmatter
// ============================================================================

/// Wrap body sections, abstracts, and backmatter content into one synthetic
/// container section each. All three containers are always created so the
/// resulting top-level order is fixed: body, abstracts, backmatter.
fn group_sections(dom: &mut Dom, article: DomId) {
    let body = match child_by_tag(dom, article, "body") {
        Some(body) => body,
        None => {
            let body = dom.create_element("body", vec![]);
            dom.append(article, body);
            body
        }
    };

    // Body group
    let body_group = dom.create_element("sec", vec![]);
    dom.set_attr(body_group, "sec-type", "body");
    for child in dom.children(body).collect::<Vec<_>>() {
        dom.append(body_group, child);
    }
    dom.append(body, body_group);

    // Backmatter group: everything from back except its title and the
    // reference list (the bibliography is parsed separately)
    let back_group = dom.create_element("sec", vec![]);
    dom.set_attr(back_group, "sec-type", "backmatter");
    if let Some(back) = child_by_tag(dom, article, "back") {
        for child in dom.child_elements(back) {
            match dom.tag(child) {
                Some("title") | Some("ref-list") => {}
                Some("app-group") => {
                    // Appendices are hoisted out of their wrapper
                    for app in dom.child_elements(child) {
                        dom.append(back_group, app);
                    }
                    dom.detach(child);
                }
                _ => dom.append(back_group, child),
            }
        }
    }
    dom.append(body, back_group);

    // Abstracts group, inserted before the last top-level child
    let abs_group = dom.create_element("sec", vec![]);
    dom.set_attr(abs_group, "sec-type", "abstracts");
    for abstract_el in dom.find_all_by_tag(article, "abstract") {
        dom.append(abs_group, abstract_el);
    }
    let last = dom.get(body).map(|n| n.last_child).unwrap_or(DomId::NONE);
    if last.is_some() {
        dom.insert_before(last, abs_group);
    } else {
        dom.append(body, abs_group);
    }
}

// ============================================================================
// 7. Keyword / supplementary-material promotion
// ============================================================================

fn promote_meta_sections(dom: &mut Dom, article: DomId) {
    let Some(body) = child_by_tag(dom, article, "body") else {
        return;
    };
    let Some(front) = child_by_tag(dom, article, "front") else {
        return;
    };
    let Some(meta) = dom.find_by_tag(front, "article-meta") else {
        return;
    };

    let mut promoted = Vec::new();

    for kwd_group in dom.find_all_by_tag(meta, "kwd-group") {
        let sec = dom.create_element("sec", vec![]);
        dom.set_attr(sec, "sec-type", "keywords");
        let title = dom.create_element("title", vec![]);
        match child_by_tag(dom, kwd_group, "title") {
            Some(source_title) => {
                for child in dom.children(source_title).collect::<Vec<_>>() {
                    dom.append(title, child);
                }
                dom.detach(source_title);
            }
            None => dom.append_text(title, "Keywords"),
        }
        dom.append(sec, title);
        dom.append(sec, kwd_group);
        promoted.push(sec);
    }

    let supplements: Vec<_> = dom
        .find_all_by_tag(meta, "supplementary-material")
        .into_iter()
        .collect();
    if !supplements.is_empty() {
        let sec = dom.create_element("sec", vec![]);
        dom.set_attr(sec, "sec-type", "supplementary-materials");
        let title = dom.create_element("title", vec![]);
        dom.append_text(title, "Supplementary Materials");
        dom.append(sec, title);
        for supp in supplements {
            dom.append(sec, supp);
        }
        promoted.push(sec);
    }

    for sec in promoted.into_iter().rev() {
        dom.prepend(body, sec);
    }
}

// ============================================================================
// Tests
// ============================================================================
