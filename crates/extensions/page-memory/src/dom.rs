//! Arena-backed document tree.

use std::collections::HashMap;

use herbie_protocols::PropertyValue;

pub(crate) type NodeId = usize;

pub(crate) const DEFAULT_WIDTH: f64 = 100.0;
pub(crate) const DEFAULT_HEIGHT: f64 = 20.0;

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub tag: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    /// Live property overrides (`value`, `checked`, ...).
    pub props: HashMap<String, PropertyValue>,
    /// Explicit box size; rendered elements default to a non-empty box.
    pub size: Option<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub nodes: Vec<Node>,
}

impl Dom {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
        }
    }

    pub fn exists(&self, id: NodeId) -> bool {
        id < self.nodes.len()
    }

    pub fn create_element(&mut self, parent: NodeId, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element(ElementData {
                tag: tag.to_ascii_lowercase(),
                attrs,
                props: HashMap::new(),
                size: None,
            }),
        });
        self.append_child(parent, id);
        id
    }

    pub fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Text(text),
        });
        self.append_child(parent, id);
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Unlink a node from its parent. The subtree stays addressable.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|c| *c != id);
        }
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(el) = self.element_mut(id) {
            match el.attrs.iter_mut().find(|(k, _)| *k == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => el.attrs.push((name, value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        match self.element_mut(id) {
            Some(el) => {
                let before = el.attrs.len();
                el.attrs.retain(|(k, _)| k != name);
                el.attrs.len() != before
            }
            None => false,
        }
    }

    pub fn classes(&self, id: NodeId) -> Vec<&str> {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Descendants of `id` in document order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.is_element(*n))
            .collect()
    }

    /// Ancestors from the parent up to the document.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        id == Self::ROOT || self.ancestors(id).last() == Some(&Self::ROOT)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    pub fn first_element_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendant_elements(Self::ROOT)
            .into_iter()
            .find(|n| self.tag(*n) == Some(tag))
    }

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.descendant_elements(Self::ROOT)
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    /// Declarations of the inline `style` attribute, names lowercased.
    pub fn inline_style(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        style.split(';').find_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            (name.trim().eq_ignore_ascii_case(property)).then(|| value.trim().to_ascii_lowercase())
        })
    }

    /// Computed `display`, honouring the `hidden` attribute and non-rendered tags.
    pub fn display(&self, id: NodeId) -> String {
        if let Some(d) = self.inline_style(id, "display") {
            return d;
        }
        match self.tag(id) {
            Some("head" | "script" | "style" | "title" | "meta" | "link" | "template") => "none".into(),
            Some(_) if self.has_attr(id, "hidden") => "none".into(),
            Some("span" | "a" | "label" | "button" | "input" | "select" | "textarea" | "img" | "b" | "i" | "strong" | "em") => {
                "inline".into()
            }
            _ => "block".into(),
        }
    }

    /// Computed `visibility`, inherited from the nearest ancestor that sets it.
    pub fn visibility(&self, id: NodeId) -> String {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|n| self.inline_style(n, "visibility"))
            .unwrap_or_else(|| "visible".into())
    }

    pub fn opacity(&self, id: NodeId) -> f64 {
        self.inline_style(id, "opacity")
            .and_then(|o| o.parse().ok())
            .unwrap_or(1.0)
    }

    /// Whether the element or an ancestor is `display: none`.
    pub fn in_undisplayed_subtree(&self, id: NodeId) -> bool {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|n| self.is_element(*n))
            .any(|n| self.display(n) == "none")
    }

    /// Box size. Undisplayed or detached elements have an empty box.
    pub fn size(&self, id: NodeId) -> (f64, f64) {
        if !self.is_connected(id) || self.in_undisplayed_subtree(id) {
            return (0.0, 0.0);
        }
        self.element(id)
            .and_then(|e| e.size)
            .unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT))
    }

    /// Rendered text: skips undisplayed subtrees and collapses whitespace.
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut raw = String::new();
        self.collect_rendered_text(id, &mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_rendered_text(&self, id: NodeId, out: &mut String) {
        for child in self.children(id) {
            match &self.nodes[*child].kind {
                NodeKind::Text(t) => out.push_str(t),
                NodeKind::Element(_) if self.display(*child) == "none" => {}
                NodeKind::Element(data) => {
                    let block = !matches!(self.display(*child).as_str(), "inline" | "inline-block");
                    if block || data.tag == "br" {
                        out.push(' ');
                    }
                    self.collect_rendered_text(*child, out);
                    if block {
                        out.push(' ');
                    }
                }
                NodeKind::Document => {}
            }
        }
    }

    /// `<option>` children of a `<select>`, including those in `<optgroup>`s.
    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendant_elements(select)
            .into_iter()
            .filter(|n| self.tag(*n) == Some("option"))
            .collect()
    }

    /// Value of an `<option>`: its `value` attribute or its text.
    pub fn option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .map(str::to_string)
            .unwrap_or_else(|| self.text_content(option).trim().to_string())
    }

    pub fn option_selected(&self, option: NodeId) -> bool {
        match self.element(option).and_then(|e| e.props.get("selected")) {
            Some(v) => v.is_truthy(),
            None => self.has_attr(option, "selected"),
        }
    }
}
