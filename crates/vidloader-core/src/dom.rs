//! Page model
//!
//! A small arena-backed document tree standing in for the browser DOM. It
//! carries exactly what the loader touches: elements with attributes,
//! classes and inline styles, text nodes, tree mutation with DOM move
//! semantics, compound-selector lookup and HTML serialization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a node owned by a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#node{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone, Default)]
struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    classes: Vec<String>,
    styles: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta", "source", "track"];

/// Document tree
///
/// Nodes are never freed; removing a node only detaches it, so a stale
/// `NodeId` stays valid but reports `is_connected() == false`.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    html: NodeId,
    head: NodeId,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing `<html><head></head><body></body></html>`
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            html: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
        };

        doc.html = doc.create_element("html");
        doc.head = doc.create_element("head");
        doc.body = doc.create_element("body");
        doc.append_child(doc.root(), doc.html);
        doc.append_child(doc.html, doc.head);
        doc.append_child(doc.html, doc.body);
        doc
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn html(&self) -> NodeId {
        self.html
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Create a detached element. Tag names are lower-cased.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.trim().to_ascii_lowercase(),
            ..Default::default()
        }))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    /// Whether `id` was issued by this document
    pub fn contains_node(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Text(text)) => Some(text),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Attributes, classes, styles
    // ------------------------------------------------------------------

    /// Set an attribute. `class` and `style` are routed to the class list and
    /// the inline style declarations.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let Some(el) = self.element_mut(id) else {
            return;
        };

        match name.as_str() {
            "class" => {
                el.classes = value.split_whitespace().map(str::to_string).collect();
            }
            "style" => {
                el.styles = parse_style(value);
            }
            _ => match el.attributes.iter_mut().find(|(k, _)| *k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => el.attributes.push((name, value.to_string())),
            },
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let el = self.element(id)?;
        let name = name.to_ascii_lowercase();

        match name.as_str() {
            "class" if !el.classes.is_empty() => Some(el.classes.join(" ")),
            "style" if !el.styles.is_empty() => Some(render_style(&el.styles)),
            "class" | "style" => None,
            _ => el
                .attributes
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone()),
        }
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(el) = self.element_mut(id) {
            match name.as_str() {
                "class" => el.classes.clear(),
                "style" => el.styles.clear(),
                _ => el.attributes.retain(|(k, _)| *k != name),
            }
        }
    }

    /// Names of the plain attributes, in insertion order
    pub fn attribute_names(&self, id: NodeId) -> Vec<String> {
        self.element(id)
            .map(|el| el.attributes.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(el) = self.element_mut(id) {
            if !el.classes.iter().any(|c| c == class) {
                el.classes.push(class.to_string());
            }
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id)
            .map(|el| el.classes.iter().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            match el.styles.iter_mut().find(|(k, _)| k == property) {
                Some((_, v)) => *v = value.to_string(),
                None => el.styles.push((property.to_string(), value.to_string())),
            }
        }
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
        self.element(id)?
            .styles
            .iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v.as_str())
    }

    // ------------------------------------------------------------------
    // Tree navigation
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Child elements, skipping text nodes
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let index = siblings.iter().position(|&c| c == id)?;
        siblings.get(index + 1).copied()
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let index = siblings.iter().position(|&c| c == id)?;
        siblings[index + 1..]
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
    }

    /// Whether the node is reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root() {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Nodes under `id` in document order, `id` excluded
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();

        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    // ------------------------------------------------------------------
    // Tree mutation
    // ------------------------------------------------------------------

    /// Detach a node from its parent. Detaching a detached node is a no-op.
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        self.nodes[parent.0].children.retain(|&c| c != id);
        self.nodes[id.0].parent = None;
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None` or not a child of `parent`.
    ///
    /// Inserting an ancestor of `parent` (or `parent` itself) is ignored.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if !self.contains_node(parent)
            || !self.contains_node(child)
            || self.is_inclusive_ancestor(child, parent)
            || matches!(self.nodes[child.0].kind, NodeKind::Document)
        {
            return;
        }
        if reference == Some(child) {
            return;
        }

        self.remove(child);

        let children = &mut self.nodes[parent.0].children;
        let index = reference
            .and_then(|r| children.iter().position(|&c| c == r))
            .unwrap_or(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Put `new` where `old` is in `parent`; `old` ends up detached.
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) {
        if self.parent(old) != Some(parent) || new == old {
            return;
        }
        self.insert_before(parent, new, Some(old));
        self.remove(old);
    }

    // ------------------------------------------------------------------
    // Selectors
    // ------------------------------------------------------------------

    /// First connected element matching `selector`, in document order
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let selector = Selector::parse(selector)?;
        self.find_first(&selector)
    }

    /// All connected elements matching `selector`, in document order
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        match Selector::parse(selector) {
            Some(selector) => self.find_all(&selector),
            None => Vec::new(),
        }
    }

    pub fn find_first(&self, selector: &Selector) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&n| selector.matches(self, n))
    }

    pub fn find_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|&n| selector.matches(self, n))
            .collect()
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Outer HTML of a node. For the document root, the serialized children.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };

        match &node.kind {
            NodeKind::Document => {
                for &child in &node.children {
                    self.write_html(child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attributes {
                    out.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
                }
                if !el.classes.is_empty() {
                    out.push_str(&format!(" class=\"{}\"", escape_attr(&el.classes.join(" "))));
                }
                if !el.styles.is_empty() {
                    out.push_str(&format!(" style=\"{}\"", escape_attr(&render_style(&el.styles))));
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                    return;
                }
                for &child in &node.children {
                    self.write_html(child, out);
                }
                out.push_str(&format!("</{}>", el.tag));
            }
        }
    }
}

fn parse_style(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let (k, v) = (k.trim(), v.trim());
            (!k.is_empty()).then(|| (k.to_string(), v.to_string()))
        })
        .collect()
}

fn render_style(styles: &[(String, String)]) -> String {
    styles
        .iter()
        .map(|(k, v)| format!("{}: {};", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// A compound selector: optional tag, id, classes and attribute tests.
///
/// Combinators and pseudo-classes are not supported; such selectors fail to
/// parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Selector {
    /// Selector matching every element with the given tag
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            ..Default::default()
        }
    }

    /// Add an `[name="value"]` test
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .push((name.to_ascii_lowercase(), Some(value.to_string())));
        self
    }

    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let chars: Vec<char> = input.chars().collect();
        let mut pos = 0;
        let mut selector = Selector::default();

        if chars[0] == '*' {
            pos = 1;
        } else if is_ident_char(chars[0]) {
            selector.tag = Some(read_ident(&chars, &mut pos)?.to_ascii_lowercase());
        }

        while pos < chars.len() {
            let c = chars[pos];
            pos += 1;
            match c {
                '#' => selector.id = Some(read_ident(&chars, &mut pos)?),
                '.' => selector.classes.push(read_ident(&chars, &mut pos)?),
                '[' => {
                    let name = read_ident(&chars, &mut pos)?.to_ascii_lowercase();
                    match chars.get(pos) {
                        Some(']') => {
                            pos += 1;
                            selector.attributes.push((name, None));
                        }
                        Some('=') => {
                            pos += 1;
                            let value = read_attr_value(&chars, &mut pos)?;
                            if chars.get(pos) != Some(&']') {
                                return None;
                            }
                            pos += 1;
                            selector.attributes.push((name, Some(value)));
                        }
                        _ => return None,
                    }
                }
                _ => return None,
            }
        }

        Some(selector)
    }

    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(el) = doc.element(id) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if el.tag != *tag {
                return false;
            }
        }
        if let Some(want) = &self.id {
            if doc.attribute(id, "id").as_deref() != Some(want.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| el.classes.contains(c)) {
            return false;
        }
        self.attributes.iter().all(|(name, value)| {
            match (doc.attribute(id, name), value) {
                (Some(actual), Some(want)) => actual == *want,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], pos: &mut usize) -> Option<String> {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    (*pos > start).then(|| chars[start..*pos].iter().collect())
}

fn read_attr_value(chars: &[char], pos: &mut usize) -> Option<String> {
    match chars.get(*pos) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != quote {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return None;
            }
            let value = chars[start..*pos].iter().collect();
            *pos += 1;
            Some(value)
        }
        _ => read_ident(chars, pos),
    }
}
