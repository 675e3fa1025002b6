//! Rule-based mapping from the canonical JATS tree to typed model nodes.
//!
//! The grammar is a prioritized table of (tag, attribute predicate, ancestor
//! context) rules evaluated first-match-wins, a data-driven substitute for
//! one-subtype-per-tag dispatch. The context predicate matches a suffix of
//! the chain of output node-type names being built, not the raw XML
//! ancestry. Elements matching no rule contribute nothing.

use crate::dom::{Dom, DomId, NodeData};
use crate::model::{ModelNode, NodeType, Value};
use crate::util::collapse_whitespace;

/// What a matched rule produces.
enum Action {
    /// Produce a node of this type.
    Node(NodeType),
    /// Drop the element and its subtree, deliberately.
    Ignore,
    /// No node of its own; children are parsed into the current parent.
    Transparent,
}

/// How a produced node's content is built.
enum Content {
    /// Recurse structurally into child elements.
    Children,
    /// Collect the element's text run (with marks and inline nodes) into a
    /// `content` attribute.
    AnnotatedText,
    /// Custom extractor; may recursively invoke the parser on sub-elements.
    Custom(fn(&mut Parser<'_>, DomId, &mut ModelNode)),
    /// Leaf node, attributes only.
    None,
}

struct Rule {
    tag: &'static str,
    /// Attribute equality predicate, e.g. `("sec-type", "keywords")`.
    attr: Option<(&'static str, &'static str)>,
    /// Suffix of the output node-type name chain; empty matches anywhere.
    context: &'static [&'static str],
    action: Action,
    content: Content,
    attrs: Option<fn(&Parser<'_>, DomId, &mut ModelNode)>,
}

impl Rule {
    const fn node(tag: &'static str, node_type: NodeType, content: Content) -> Self {
        Rule {
            tag,
            attr: None,
            context: &[],
            action: Action::Node(node_type),
            content,
            attrs: None,
        }
    }

    const fn ignore(tag: &'static str) -> Self {
        Rule {
            tag,
            attr: None,
            context: &[],
            action: Action::Ignore,
            content: Content::None,
            attrs: None,
        }
    }

    const fn transparent(tag: &'static str) -> Self {
        Rule {
            tag,
            attr: None,
            context: &[],
            action: Action::Transparent,
            content: Content::None,
            attrs: None,
        }
    }

    const fn with_attr(mut self, key: &'static str, value: &'static str) -> Self {
        self.attr = Some((key, value));
        self
    }

    const fn in_context(mut self, context: &'static [&'static str]) -> Self {
        self.context = context;
        self
    }

    const fn extracting(mut self, f: fn(&Parser<'_>, DomId, &mut ModelNode)) -> Self {
        self.attrs = Some(f);
        self
    }
}

/// The rule table. Order encodes priority: attribute- and context-qualified
/// rules must precede their generic fallbacks.
fn rules() -> &'static [Rule] {
    static RULES: &[Rule] = &[
        // Qualified section rules before the generic one
        Rule::node("sec", NodeType::Keywords, Content::Custom(keywords_content))
            .with_attr("sec-type", "keywords"),
        Rule::node("sec", NodeType::Section, Content::Children).extracting(section_attrs),
        Rule::node("abstract", NodeType::Section, Content::Children).extracting(abstract_attrs),
        Rule::node("ack", NodeType::Section, Content::Children).extracting(ack_attrs),
        Rule::node("app", NodeType::Section, Content::Children).extracting(appendix_attrs),
        // Captions only exist inside figures and tables; a context-qualified
        // rule per container precedes the generic ignore
        Rule::node("caption", NodeType::Caption, Content::Children).in_context(&["figure"]),
        Rule::node("caption", NodeType::Caption, Content::Children).in_context(&["table-figure"]),
        Rule::node("caption", NodeType::Caption, Content::Children)
            .in_context(&["supplementary"]),
        Rule::ignore("caption"),
        // Text blocks
        Rule::node("title", NodeType::Heading, Content::AnnotatedText),
        Rule::node("p", NodeType::Paragraph, Content::AnnotatedText),
        // Figures and tables
        Rule::node("fig", NodeType::Figure, Content::Custom(figure_content)),
        Rule::node(
            "table-wrap",
            NodeType::TableFigure,
            Content::Custom(table_figure_content),
        ),
        Rule::node("table", NodeType::Table, Content::Children),
        Rule::transparent("thead"),
        Rule::transparent("tbody"),
        Rule::transparent("tfoot"),
        Rule::node("tr", NodeType::TableRow, Content::Children),
        Rule::node("th", NodeType::TableCell, Content::AnnotatedText).extracting(th_attrs),
        Rule::node("td", NodeType::TableCell, Content::AnnotatedText).extracting(td_attrs),
        Rule::ignore("colgroup"),
        Rule::ignore("col"),
        // Footnotes
        Rule::transparent("fn-group"),
        Rule::node("fn", NodeType::Footnote, Content::Children).extracting(footnote_attrs),
        // Graphics and media
        Rule::node("graphic", NodeType::Graphic, Content::None).extracting(graphic_attrs),
        Rule::node(
            "supplementary-material",
            NodeType::Supplementary,
            Content::Children,
        )
        .extracting(graphic_attrs),
        // Math
        Rule::node("disp-formula", NodeType::Math, Content::Custom(math_content)),
        // Lists
        Rule::node("list", NodeType::List, Content::Children).extracting(list_attrs),
        Rule::node("list-item", NodeType::ListItem, Content::Children),
        // Structural leftovers consumed by parent extractors
        Rule::ignore("label"),
        Rule::ignore("object-id"),
        Rule::ignore("alt-text"),
        Rule::ignore("kwd-group"),
    ];
    RULES
}

/// Inline mark tags, matched independently of the block rule table.
fn mark_type(tag: &str) -> Option<NodeType> {
    match tag {
        "bold" => Some(NodeType::Bold),
        "italic" => Some(NodeType::Italic),
        "underline" => Some(NodeType::Underline),
        "sc" => Some(NodeType::SmallCaps),
        "monospace" => Some(NodeType::Monospace),
        "sup" => Some(NodeType::Superscript),
        "sub" => Some(NodeType::Subscript),
        _ => None,
    }
}

// ============================================================================
// Parser
// ============================================================================

pub struct Parser<'a> {
    dom: &'a Dom,
    /// Chain of output node-type names being built.
    path: Vec<&'static str>,
}

/// Parse the canonical body tree into the typed output graph.
pub fn parse_body(dom: &Dom, article: DomId) -> ModelNode {
    let mut root = ModelNode::new(NodeType::Body);
    let Some(body) = dom
        .children(article)
        .find(|&c| dom.tag(c) == Some("body"))
    else {
        return root;
    };

    let mut parser = Parser {
        dom,
        path: vec![NodeType::Body.name()],
    };
    parser.parse_children(body, &mut root);
    root
}

impl<'a> Parser<'a> {
    /// Parse all child elements of `dom_parent` into `out`.
    fn parse_children(&mut self, dom_parent: DomId, out: &mut ModelNode) {
        for child in self.dom.children(dom_parent).collect::<Vec<_>>() {
            if self.dom.is_element(child) {
                self.parse_element(child, out);
            }
        }
    }

    /// Parse one element; appends the produced node (if any) to `out`.
    fn parse_element(&mut self, el: DomId, out: &mut ModelNode) {
        let Some(tag) = self.dom.tag(el) else {
            return;
        };
        let Some(rule) = self.match_rule(el, tag) else {
            // No rule and no ignore entry: deliberate silent no-op
            return;
        };

        match rule.action {
            Action::Ignore => {}
            Action::Transparent => self.parse_children(el, out),
            Action::Node(node_type) => {
                let mut node = ModelNode::new(node_type);
                if let Some(id) = self.dom.attr(el, "id") {
                    node.id = id.to_string();
                }
                if let Some(extract) = rule.attrs {
                    extract(self, el, &mut node);
                }

                self.path.push(node_type.name());
                match rule.content {
                    Content::Children => self.parse_children(el, &mut node),
                    Content::AnnotatedText => self.annotated_text(el, &mut node),
                    Content::Custom(f) => f(self, el, &mut node),
                    Content::None => {}
                }
                self.path.pop();

                out.children.push(node);
            }
        }
    }

    /// First rule whose tag, attribute predicate, and ancestor context match.
    fn match_rule(&self, el: DomId, tag: &str) -> Option<&'static Rule> {
        rules().iter().find(|rule| {
            rule.tag == tag
                && rule
                    .attr
                    .is_none_or(|(k, v)| self.dom.attr(el, k) == Some(v))
                && (rule.context.is_empty() || self.path.ends_with(rule.context))
        })
    }

    // ------------------------------------------------------------------
    // Annotated text
    // ------------------------------------------------------------------

    /// Collect the element's text run into a `content` attribute, composing
    /// marks and inline nodes (citations, links, formulas) as offset-carrying
    /// children of the block node.
    fn annotated_text(&mut self, el: DomId, out: &mut ModelNode) {
        let mut sink = TextSink::new();
        self.collect_inline(el, &mut sink, out);
        out.set_text("content", sink.finish());
    }

    fn collect_inline(&mut self, el: DomId, sink: &mut TextSink, out: &mut ModelNode) {
        for child in self.dom.children(el).collect::<Vec<_>>() {
            let Some(node) = self.dom.get(child) else {
                continue;
            };
            match &node.data {
                NodeData::Text(s) => sink.push_str(s),
                NodeData::Element { tag, .. } => {
                    let tag = tag.as_str();
                    if let Some(mark) = mark_type(tag) {
                        let start = sink.mark_start();
                        self.collect_inline(child, sink, out);
                        let end = sink.len();
                        let mut mark_node = ModelNode::new(mark);
                        mark_node.set_int("start", start as i64);
                        mark_node.set_int("end", end as i64);
                        out.children.push(mark_node);
                    } else if let Some(inline) = self.inline_node(child, tag, sink) {
                        out.children.push(inline);
                    }
                    // Unknown inline elements contribute nothing
                }
                _ => {}
            }
        }
    }

    /// Inline non-mark nodes: citations, external links, inline formulas.
    fn inline_node(&mut self, el: DomId, tag: &str, sink: &mut TextSink) -> Option<ModelNode> {
        match tag {
            "xref" => {
                let start = sink.mark_start();
                sink.push_str(&self.dom.deep_text(el));
                let end = sink.len();

                let mut node = ModelNode::new(NodeType::Citation);
                if let Some(id) = self.dom.attr(el, "id") {
                    node.id = id.to_string();
                }
                node.set_str(
                    "ref-type",
                    self.dom.attr(el, "ref-type").unwrap_or_default(),
                );
                let rids: Vec<String> = self
                    .dom
                    .attr(el, "rid")
                    .unwrap_or_default()
                    .split_ascii_whitespace()
                    .map(str::to_owned)
                    .collect();
                node.set_refs("targets", rids);
                node.set_int("start", start as i64);
                node.set_int("end", end as i64);
                Some(node)
            }
            "ext-link" => {
                let start = sink.mark_start();
                sink.push_str(&self.dom.deep_text(el));
                let end = sink.len();

                let mut node = ModelNode::new(NodeType::ExternalLink);
                if let Some(id) = self.dom.attr(el, "id") {
                    node.id = id.to_string();
                }
                node.set_str("href", self.dom.attr(el, "xlink:href").unwrap_or_default());
                node.set_int("start", start as i64);
                node.set_int("end", end as i64);
                Some(node)
            }
            "inline-formula" => {
                let start = sink.mark_start();
                sink.push_str("\u{fffc}");
                let end = sink.len();

                let mut node = ModelNode::new(NodeType::InlineFormula);
                if let Some(id) = self.dom.attr(el, "id") {
                    node.id = id.to_string();
                }
                extract_formula(self.dom, el, &mut node);
                node.set_int("start", start as i64);
                node.set_int("end", end as i64);
                Some(node)
            }
            _ => None,
        }
    }
}

// ============================================================================
// Attribute extractors
// ============================================================================

fn section_attrs(p: &Parser<'_>, el: DomId, node: &mut ModelNode) {
    if let Some(sec_type) = p.dom.attr(el, "sec-type") {
        node.set_str("content-type", sec_type);
    }
}

fn abstract_attrs(_p: &Parser<'_>, _el: DomId, node: &mut ModelNode) {
    node.set_str("content-type", "abstract");
}

fn ack_attrs(_p: &Parser<'_>, _el: DomId, node: &mut ModelNode) {
    node.set_str("content-type", "acknowledgements");
}

fn appendix_attrs(_p: &Parser<'_>, _el: DomId, node: &mut ModelNode) {
    node.set_str("content-type", "appendix");
}

fn footnote_attrs(p: &Parser<'_>, el: DomId, node: &mut ModelNode) {
    let label = p
        .dom
        .children(el)
        .find(|&c| p.dom.tag(c) == Some("label"))
        .map(|c| collapse_whitespace(p.dom.deep_text(c).trim()))
        .unwrap_or_default();
    node.set_str("label", label);
}

fn graphic_attrs(p: &Parser<'_>, el: DomId, node: &mut ModelNode) {
    node.set_str("href", p.dom.attr(el, "xlink:href").unwrap_or_default());
    if let Some(mimetype) = p.dom.attr(el, "mimetype") {
        node.set_str("mimetype", mimetype);
    }
}

fn list_attrs(p: &Parser<'_>, el: DomId, node: &mut ModelNode) {
    node.set_str(
        "list-type",
        p.dom.attr(el, "list-type").unwrap_or("bullet"),
    );
}

fn th_attrs(p: &Parser<'_>, el: DomId, node: &mut ModelNode) {
    node.set_bool("heading", true);
    cell_span_attrs(p, el, node);
}

fn td_attrs(p: &Parser<'_>, el: DomId, node: &mut ModelNode) {
    node.set_bool("heading", false);
    cell_span_attrs(p, el, node);
}

fn cell_span_attrs(p: &Parser<'_>, el: DomId, node: &mut ModelNode) {
    for key in ["rowspan", "colspan"] {
        if let Some(span) = p.dom.attr(el, key).and_then(|v| v.parse::<i64>().ok()) {
            node.set_int(key, span);
        }
    }
}

// ============================================================================
// Content extractors
// ============================================================================

/// Keywords section: title plus the terms of its keyword group.
fn keywords_content(p: &mut Parser<'_>, el: DomId, node: &mut ModelNode) {
    let mut title = String::new();
    let mut terms = Vec::new();

    for child in p.dom.children(el).collect::<Vec<_>>() {
        match p.dom.tag(child) {
            Some("title") => title = collapse_whitespace(p.dom.deep_text(child).trim()),
            Some("kwd-group") => {
                for kwd in p.dom.find_all_by_tag(child, "kwd") {
                    terms.push(collapse_whitespace(p.dom.deep_text(kwd).trim()));
                }
            }
            _ => {}
        }
    }

    node.set_text("title", title);
    node.attrs.insert("terms", Value::StrList(terms));
}

/// Figure: label, graphic child, caption parsed as a compound structure.
fn figure_content(p: &mut Parser<'_>, el: DomId, node: &mut ModelNode) {
    for child in p.dom.children(el).collect::<Vec<_>>() {
        match p.dom.tag(child) {
            Some("label") => {
                node.set_str("label", collapse_whitespace(p.dom.deep_text(child).trim()));
            }
            Some("graphic") | Some("caption") => p.parse_element(child, node),
            _ => {}
        }
    }
}

/// Table figure: label, caption, the table itself, and table footnotes.
fn table_figure_content(p: &mut Parser<'_>, el: DomId, node: &mut ModelNode) {
    for child in p.dom.children(el).collect::<Vec<_>>() {
        match p.dom.tag(child) {
            Some("label") => {
                node.set_str("label", collapse_whitespace(p.dom.deep_text(child).trim()));
            }
            Some("caption") | Some("table") => p.parse_element(child, node),
            Some("table-wrap-foot") => {
                for fn_el in p.dom.find_all_by_tag(child, "fn") {
                    p.parse_element(fn_el, node);
                }
            }
            _ => {}
        }
    }
}

/// Display math. Resolves competing encodings by preferring the first
/// recognized format in a fixed priority order: TeX before MathML.
fn math_content(p: &mut Parser<'_>, el: DomId, node: &mut ModelNode) {
    extract_formula(p.dom, el, node);
}

fn extract_formula(dom: &Dom, el: DomId, node: &mut ModelNode) {
    if let Some(tex) = dom.find_by_tag(el, "tex-math") {
        node.set_str("format", "tex");
        node.set_text("source", collapse_whitespace(dom.deep_text(tex).trim()));
    } else if let Some(mml) = dom.find_by_tag(el, "mml:math") {
        node.set_str("format", "mathml");
        node.set_text("source", dom.serialize(mml));
    } else {
        node.set_str("format", "");
        node.set_text("source", "");
    }
}

// ============================================================================
// Text sink
// ============================================================================

/// Accumulates a text run, collapsing whitespace as it goes so mark offsets
/// are final the moment they are recorded.
struct TextSink {
    buf: String,
    space_pending: bool,
}

impl TextSink {
    fn new() -> Self {
        Self {
            buf: String::new(),
            space_pending: false,
        }
    }

    fn push_str(&mut self, s: &str) {
        for c in s.chars() {
            if c.is_whitespace() {
                if !self.buf.is_empty() {
                    self.space_pending = true;
                }
            } else {
                if self.space_pending {
                    self.buf.push(' ');
                    self.space_pending = false;
                }
                self.buf.push(c);
            }
        }
    }

    /// Byte offset where a mark starting now begins. Flushes any pending
    /// separator first so the offset points at the mark's own content.
    fn mark_start(&mut self) -> usize {
        if self.space_pending {
            self.buf.push(' ');
            self.space_pending = false;
        }
        self.buf.len()
    }

    fn len(&self) -> usize {
        self.buf.len()
    }

    fn finish(self) -> String {
        self.buf
    }
}

// ============================================================================
// Tests
// ============================================================================
