//! In-memory reference surface (v0.1)
//!
//! Backs tests and demos with a minimal markup grammar instead of a real
//! UI toolkit:
//!
//! - elements: `<tag attr="value">children</tag>` or `<tag ... />`
//! - attribute values are double-quoted, no escapes
//! - text runs between tags are preserved verbatim
//!
//! No comments, no doctype, no entity decoding. This is deliberately the
//! smallest grammar the placeholder rewrite and template capture need.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::BindError;
use crate::surface::{ActionKind, InputKind, NodeId, RootDeclaration, Selector, Surface};

// ============================================================================
// NODE STORAGE
// ============================================================================

#[derive(Debug, Clone)]
enum ChildRec {
    Element(NodeId),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeRec {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<ChildRec>,
    parent: Option<NodeId>,
    value: String,
    checked: bool,
    visible: bool,
    image_source: Option<String>,
}

impl NodeRec {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<NodeId, NodeRec>,
    root: NodeId,
    next_id: NodeId,
    value_writes: HashMap<NodeId, usize>,
    opened: Vec<String>,
}

impl Inner {
    fn alloc(&mut self, tag: String, attrs: Vec<(String, String)>, parent: Option<NodeId>) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;

        let value = attrs
            .iter()
            .find(|(n, _)| n == "value")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let checked = attrs.iter().any(|(n, _)| n == "checked");

        self.nodes.insert(
            id,
            NodeRec {
                tag,
                attrs,
                children: Vec::new(),
                parent,
                value,
                checked,
                visible: true,
                image_source: None,
            },
        );
        id
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(rec) = self.nodes.get(&id) else { return };
        for child in &rec.children {
            if let ChildRec::Element(child_id) = child {
                out.push(*child_id);
                self.collect_descendants(*child_id, out);
            }
        }
    }

    fn serialize_children(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(rec) = self.nodes.get(&id) {
            for child in &rec.children {
                match child {
                    ChildRec::Text(text) => out.push_str(text),
                    ChildRec::Element(child_id) => self.serialize_element(*child_id, &mut out),
                }
            }
        }
        out
    }

    fn serialize_element(&self, id: NodeId, out: &mut String) {
        let Some(rec) = self.nodes.get(&id) else { return };
        out.push('<');
        out.push_str(&rec.tag);
        for (name, value) in &rec.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }
        out.push('>');
        for child in &rec.children {
            match child {
                ChildRec::Text(text) => out.push_str(text),
                ChildRec::Element(child_id) => self.serialize_element(*child_id, out),
            }
        }
        out.push_str("</");
        out.push_str(&rec.tag);
        out.push('>');
    }

    fn matches(&self, rec: &NodeRec, selector: Selector) -> bool {
        match selector {
            Selector::Collection => {
                rec.attr("type") == Some("collection") && rec.attr("path").is_some()
            }
            Selector::AssetDisplay => rec.tag == "img" && rec.attr("path").is_some(),
            Selector::ScalarBound => {
                (rec.tag == "input" || rec.tag == "textarea") && rec.attr("path").is_some()
            }
            Selector::Conditional => rec.attr("show").is_some(),
        }
    }
}

// ============================================================================
// MARKUP PARSER
// ============================================================================

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, detail: impl Into<String>) -> BindError {
        BindError::Markup {
            position: self.pos,
            detail: detail.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn bump(&mut self, n: usize) {
        self.pos += n;
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn read_name(&mut self) -> Result<String, BindError> {
        let name: String = self
            .rest()
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if name.is_empty() {
            return Err(self.error("expected a name"));
        }
        self.bump(name.len());
        Ok(name)
    }

    fn expect(&mut self, token: &str) -> Result<(), BindError> {
        if !self.starts_with(token) {
            return Err(self.error(format!("expected '{token}'")));
        }
        self.bump(token.len());
        Ok(())
    }

    /// Parse sibling content until end of input (`closing == None`) or
    /// until the matching close tag
    fn parse_children(
        &mut self,
        inner: &mut Inner,
        parent: NodeId,
        closing: Option<&str>,
    ) -> Result<Vec<ChildRec>, BindError> {
        let mut children = Vec::new();
        loop {
            if self.at_end() {
                return match closing {
                    Some(tag) => Err(self.error(format!("unclosed element <{tag}>"))),
                    None => Ok(children),
                };
            }
            if self.starts_with("</") {
                let Some(expected) = closing else {
                    return Err(self.error("unexpected closing tag"));
                };
                self.bump(2);
                let name = self.read_name()?;
                self.skip_ws();
                self.expect(">")?;
                if name != expected {
                    return Err(self.error(format!("expected </{expected}>, found </{name}>")));
                }
                return Ok(children);
            }
            if self.starts_with("<") {
                let id = self.parse_element(inner, Some(parent))?;
                children.push(ChildRec::Element(id));
                continue;
            }
            let end = self
                .rest()
                .find('<')
                .map(|i| self.pos + i)
                .unwrap_or(self.src.len());
            children.push(ChildRec::Text(self.src[self.pos..end].to_string()));
            self.pos = end;
        }
    }

    fn parse_element(
        &mut self,
        inner: &mut Inner,
        parent: Option<NodeId>,
    ) -> Result<NodeId, BindError> {
        self.expect("<")?;
        let tag = self.read_name()?;

        let mut attrs = Vec::new();
        let self_closing;
        loop {
            self.skip_ws();
            if self.starts_with("/>") {
                self.bump(2);
                self_closing = true;
                break;
            }
            if self.starts_with(">") {
                self.bump(1);
                self_closing = false;
                break;
            }
            if self.at_end() {
                return Err(self.error(format!("unterminated tag <{tag}>")));
            }
            let name = self.read_name()?;
            self.skip_ws();
            self.expect("=")?;
            self.skip_ws();
            self.expect("\"")?;
            let value_end = self
                .rest()
                .find('"')
                .ok_or_else(|| self.error("unterminated attribute value"))?;
            let value = self.src[self.pos..self.pos + value_end].to_string();
            self.bump(value_end + 1);
            attrs.push((name, value));
        }

        let id = inner.alloc(tag.clone(), attrs, parent);
        if !self_closing {
            let children = self.parse_children(inner, id, Some(&tag))?;
            inner
                .nodes
                .get_mut(&id)
                .expect("node just allocated")
                .children = children;
        }
        Ok(id)
    }
}

// ============================================================================
// MEMORY SURFACE
// ============================================================================

/// In-memory surface over the minimal markup grammar
///
/// Clones share the same underlying tree (Arc), matching the handle shape
/// of the other reference implementations in this crate.
#[derive(Clone)]
pub struct MemorySurface {
    inner: Arc<RwLock<Inner>>,
}

impl MemorySurface {
    /// Build a surface from markup with a single root element
    pub fn from_markup(markup: &str) -> Result<Self, BindError> {
        let mut inner = Inner {
            next_id: 1,
            ..Inner::default()
        };
        let mut parser = Parser::new(markup);
        parser.skip_ws();
        if !parser.starts_with("<") {
            return Err(parser.error("expected a root element"));
        }
        let root = parser.parse_element(&mut inner, None)?;
        parser.skip_ws();
        if !parser.at_end() {
            return Err(parser.error("trailing content after root element"));
        }
        inner.root = root;
        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
        })
    }

    /// Handle of the binding root element
    pub fn root(&self) -> NodeId {
        self.inner.read().root
    }

    /// First node (document order, root excluded) carrying `attr="value"`
    pub fn find_by_attr(&self, attr: &str, value: &str) -> Option<NodeId> {
        let inner = self.inner.read();
        let mut order = Vec::new();
        inner.collect_descendants(inner.root, &mut order);
        order.into_iter().find(|id| {
            inner
                .nodes
                .get(id)
                .is_some_and(|rec| rec.attr(attr) == Some(value))
        })
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.inner
            .read()
            .nodes
            .get(&id)
            .and_then(|rec| rec.attr(name).map(str::to_string))
    }

    pub fn visible(&self, id: NodeId) -> bool {
        self.inner
            .read()
            .nodes
            .get(&id)
            .is_some_and(|rec| rec.visible)
    }

    pub fn image_source(&self, id: NodeId) -> Option<String> {
        self.inner
            .read()
            .nodes
            .get(&id)
            .and_then(|rec| rec.image_source.clone())
    }

    /// Payloads handed to the embedder's viewer, oldest first
    pub fn opened_assets(&self) -> Vec<String> {
        self.inner.read().opened.clone()
    }

    /// How many times `set_value` touched this node (re-touch assertions)
    pub fn value_write_count(&self, id: NodeId) -> usize {
        self.inner
            .read()
            .value_writes
            .get(&id)
            .copied()
            .unwrap_or(0)
    }
}

impl Surface for MemorySurface {
    fn root_declaration(&self) -> RootDeclaration {
        let inner = self.inner.read();
        let Some(rec) = inner.nodes.get(&inner.root) else {
            return RootDeclaration::default();
        };
        RootDeclaration {
            path: rec.attr("path").map(str::to_string),
            credential: rec.attr("credential").map(str::to_string),
        }
    }

    fn detach_root_declaration(&self) {
        let mut inner = self.inner.write();
        let root = inner.root;
        if let Some(rec) = inner.nodes.get_mut(&root) {
            rec.attrs
                .retain(|(name, _)| name != "path" && name != "credential");
        }
    }

    fn select(&self, selector: Selector) -> Vec<NodeId> {
        let inner = self.inner.read();
        let mut order = Vec::new();
        inner.collect_descendants(inner.root, &mut order);
        order
            .into_iter()
            .filter(|id| {
                inner
                    .nodes
                    .get(id)
                    .is_some_and(|rec| inner.matches(rec, selector))
            })
            .collect()
    }

    fn exists(&self, id: NodeId) -> bool {
        self.inner.read().nodes.contains_key(&id)
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner.read().nodes.get(&id).and_then(|rec| rec.parent)
    }

    fn path_fragment(&self, id: NodeId) -> Option<String> {
        self.attr(id, "path")
    }

    fn show_fragment(&self, id: NodeId) -> Option<String> {
        self.attr(id, "show")
    }

    fn action(&self, id: NodeId) -> Option<ActionKind> {
        match self.attr(id, "action").as_deref() {
            Some("add") => Some(ActionKind::Add),
            Some("remove") => Some(ActionKind::Remove),
            _ => None,
        }
    }

    fn input_kind(&self, id: NodeId) -> Option<InputKind> {
        let inner = self.inner.read();
        let rec = inner.nodes.get(&id)?;
        match rec.tag.as_str() {
            "textarea" => Some(InputKind::TextArea),
            "input" => Some(match rec.attr("type") {
                Some("email") => InputKind::Email,
                Some("number") => InputKind::Number,
                Some("checkbox") => InputKind::Checkbox,
                Some("file") => InputKind::File,
                // Untyped inputs behave as text inputs.
                _ => InputKind::Text,
            }),
            _ => None,
        }
    }

    fn value(&self, id: NodeId) -> Option<String> {
        self.input_kind(id)?;
        self.inner
            .read()
            .nodes
            .get(&id)
            .map(|rec| rec.value.clone())
    }

    fn set_value(&self, id: NodeId, value: &str) {
        let mut inner = self.inner.write();
        if let Some(rec) = inner.nodes.get_mut(&id) {
            rec.value = value.to_string();
            *inner.value_writes.entry(id).or_insert(0) += 1;
        }
    }

    fn checked(&self, id: NodeId) -> bool {
        self.inner
            .read()
            .nodes
            .get(&id)
            .is_some_and(|rec| rec.checked)
    }

    fn set_checked(&self, id: NodeId, checked: bool) {
        if let Some(rec) = self.inner.write().nodes.get_mut(&id) {
            rec.checked = checked;
        }
    }

    fn set_visible(&self, id: NodeId, visible: bool) {
        if let Some(rec) = self.inner.write().nodes.get_mut(&id) {
            rec.visible = visible;
        }
    }

    fn set_image_source(&self, id: NodeId, source: &str) {
        if let Some(rec) = self.inner.write().nodes.get_mut(&id) {
            rec.image_source = Some(source.to_string());
        }
    }

    fn open_asset(&self, payload: &str) {
        self.inner.write().opened.push(payload.to_string());
    }

    fn inner_markup(&self, id: NodeId) -> Option<String> {
        let inner = self.inner.read();
        inner.nodes.contains_key(&id).then(|| inner.serialize_children(id))
    }

    fn set_inner_markup(&self, id: NodeId, markup: &str) {
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(&id) {
            return;
        }

        let mut doomed = Vec::new();
        inner.collect_descendants(id, &mut doomed);
        for dead in &doomed {
            inner.nodes.remove(dead);
            inner.value_writes.remove(dead);
        }

        let mut parser = Parser::new(markup);
        match parser.parse_children(&mut inner, id, None) {
            Ok(children) => {
                inner.nodes.get_mut(&id).expect("checked above").children = children;
            }
            Err(err) => {
                tracing::warn!(node = id, %err, "rejecting malformed child markup");
                inner.nodes.get_mut(&id).expect("checked above").children = Vec::new();
            }
        }
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let inner = self.inner.read();
        let mut out = Vec::new();
        inner.collect_descendants(id, &mut out);
        out
    }
}
