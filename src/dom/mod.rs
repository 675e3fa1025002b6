//! Arena-based DOM for JATS XML.
//!
//! All nodes live in a contiguous vector; parent/child/sibling links are
//! indices into it. The conversion pipeline owns exactly one `Dom` per
//! document and mutates it in place, so every structural rewrite is link
//! surgery on the arena rather than pointer churn.

mod reader;

pub use reader::parse_xml;

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomId(pub u32);

impl DomId {
    /// Sentinel value for no node.
    pub const NONE: DomId = DomId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// An XML attribute. `name` keeps any namespace prefix (e.g. `xlink:href`).
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Node payload in the arena DOM.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Document,
    /// Element with local tag name and attributes.
    Element { tag: String, attrs: Vec<Attribute> },
    /// Text content.
    Text(String),
    /// Processing instruction with target and raw payload.
    Pi { target: String, data: String },
    /// Comment (preserved for traversal parity, contributes nothing).
    Comment(String),
}

/// A node in the arena DOM.
#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: DomId,
    pub first_child: DomId,
    pub last_child: DomId,
    pub prev_sibling: DomId,
    pub next_sibling: DomId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: DomId::NONE,
            first_child: DomId::NONE,
            last_child: DomId::NONE,
            prev_sibling: DomId::NONE,
            next_sibling: DomId::NONE,
        }
    }
}

/// Arena-based XML DOM tree.
pub struct Dom {
    nodes: Vec<Node>,
    document: DomId,
}

impl Dom {
    /// Create a new empty DOM with a document root.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: DomId::NONE,
        };
        dom.document = dom.alloc(Node::new(NodeData::Document));
        dom
    }

    fn alloc(&mut self, node: Node) -> DomId {
        let id = DomId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the document root ID.
    pub fn document(&self) -> DomId {
        self.document
    }

    /// Get a node by ID.
    pub fn get(&self, id: DomId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID.
    pub fn get_mut(&mut self, id: DomId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a new element node.
    pub fn create_element(&mut self, tag: &str, attrs: Vec<Attribute>) -> DomId {
        self.alloc(Node::new(NodeData::Element {
            tag: tag.to_string(),
            attrs,
        }))
    }

    /// Create a new text node.
    pub fn create_text(&mut self, text: String) -> DomId {
        self.alloc(Node::new(NodeData::Text(text)))
    }

    /// Create a processing instruction node.
    pub fn create_pi(&mut self, target: String, data: String) -> DomId {
        self.alloc(Node::new(NodeData::Pi { target, data }))
    }

    /// Create a comment node.
    pub fn create_comment(&mut self, text: String) -> DomId {
        self.alloc(Node::new(NodeData::Comment(text)))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Append a child to a parent node. Detaches the child first if it is
    /// already linked somewhere in the tree.
    pub fn append(&mut self, parent: DomId, child: DomId) {
        self.detach(child);

        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(DomId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
        }

        if last_child.is_some()
            && let Some(last_node) = self.get_mut(last_child)
        {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert a node before a sibling. Detaches the node first.
    pub fn insert_before(&mut self, sibling: DomId, new_node: DomId) {
        self.detach(new_node);

        let parent = self
            .get(sibling)
            .map(|n| n.parent)
            .unwrap_or(DomId::NONE);
        let prev = self
            .get(sibling)
            .map(|n| n.prev_sibling)
            .unwrap_or(DomId::NONE);

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Insert a node as the first child of a parent.
    pub fn prepend(&mut self, parent: DomId, child: DomId) {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(DomId::NONE);
        if first.is_some() {
            self.insert_before(first, child);
        } else {
            self.append(parent, child);
        }
    }

    /// Unlink a node from its parent and siblings. The node (and its own
    /// subtree) stays valid and can be re-inserted elsewhere.
    pub fn detach(&mut self, id: DomId) {
        let (parent, prev, next) = match self.get(id) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };
        if parent.is_none() {
            return;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.last_child = prev;
        }

        if let Some(node) = self.get_mut(id) {
            node.parent = DomId::NONE;
            node.prev_sibling = DomId::NONE;
            node.next_sibling = DomId::NONE;
        }
    }

    /// Append text to an existing trailing text node, or create a new one.
    pub fn append_text(&mut self, parent: DomId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(DomId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let NodeData::Text(existing) = &mut last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Iterate over children of a node.
    pub fn children(&self, parent: DomId) -> ChildrenIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(DomId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    /// Child elements only (skipping text, PI, and comment nodes).
    pub fn child_elements(&self, parent: DomId) -> Vec<DomId> {
        self.children(parent)
            .filter(|&id| self.is_element(id))
            .collect()
    }

    /// Find the first element matching a predicate (depth-first, document order).
    pub fn find<F>(&self, root: DomId, predicate: F) -> Option<DomId>
    where
        F: Fn(&Dom, DomId) -> bool,
    {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if predicate(self, id) {
                return Some(id);
            }
            let mut children: Vec<_> = self.children(id).collect();
            children.reverse();
            stack.extend(children);
        }
        None
    }

    /// Collect all elements under `root` (inclusive) matching a predicate,
    /// in document order.
    pub fn find_all<F>(&self, root: DomId, predicate: F) -> Vec<DomId>
    where
        F: Fn(&Dom, DomId) -> bool,
    {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if predicate(self, id) {
                out.push(id);
            }
            let mut children: Vec<_> = self.children(id).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Find the first element with the given tag under `root` (inclusive).
    pub fn find_by_tag(&self, root: DomId, tag: &str) -> Option<DomId> {
        self.find(root, |dom, id| dom.tag(id) == Some(tag))
    }

    /// Collect all elements with the given tag under `root`, document order.
    pub fn find_all_by_tag(&self, root: DomId, tag: &str) -> Vec<DomId> {
        self.find_all(root, |dom, id| dom.tag(id) == Some(tag))
    }

    /// Breadth-first traversal of the whole tree.
    pub fn breadth_first(&self, root: DomId) -> Vec<DomId> {
        let mut out = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(root);
        while let Some(id) = queue.pop_front() {
            out.push(id);
            queue.extend(self.children(id));
        }
        out
    }

    // ------------------------------------------------------------------
    // Element accessors
    // ------------------------------------------------------------------

    /// Get element's tag name.
    pub fn tag(&self, id: DomId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        })
    }

    /// Get an attribute value. Matches the full name, prefix included.
    pub fn attr(&self, id: DomId, name: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Set (or add) an attribute on an element.
    pub fn set_attr(&mut self, id: DomId, name: &str, value: &str) {
        if let Some(node) = self.get_mut(id)
            && let NodeData::Element { attrs, .. } = &mut node.data
        {
            if let Some(existing) = attrs.iter_mut().find(|a| a.name == name) {
                existing.value = value.to_string();
            } else {
                attrs.push(Attribute {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
    }

    /// Check if node is an element.
    pub fn is_element(&self, id: DomId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    /// Check if node is a text node.
    pub fn is_text(&self, id: DomId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Text(_)))
    }

    /// Get text content of a text node.
    pub fn text(&self, id: DomId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Concatenated text of the whole subtree, document order.
    pub fn deep_text(&self, id: DomId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: DomId, out: &mut String) {
        if let Some(node) = self.get(id) {
            if let NodeData::Text(s) = &node.data {
                out.push_str(s);
            }
            for child in self.children(id).collect::<Vec<_>>() {
                self.collect_text(child, out);
            }
        }
    }

    /// Serialize a subtree back to XML markup (used for embedded formats
    /// like MathML whose source must be preserved verbatim).
    pub fn serialize(&self, id: DomId) -> String {
        let mut out = String::new();
        self.write_xml(id, &mut out);
        out
    }

    fn write_xml(&self, id: DomId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.data {
            NodeData::Document => {
                for child in self.children(id).collect::<Vec<_>>() {
                    self.write_xml(child, out);
                }
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for attr in attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    out.push_str(&escape_xml(&attr.value));
                    out.push('"');
                }
                if node.first_child.is_none() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for child in self.children(id).collect::<Vec<_>>() {
                        self.write_xml(child, out);
                    }
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
            NodeData::Text(s) => out.push_str(&escape_xml(s)),
            NodeData::Pi { .. } | NodeData::Comment(_) => {}
        }
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    dom: &'a Dom,
    current: DomId,
}

impl<'a> Iterator for ChildrenIter<'a> {
    type Item = DomId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(DomId::NONE);
        Some(id)
    }
}
