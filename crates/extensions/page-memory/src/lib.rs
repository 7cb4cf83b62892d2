//! In-memory page backend for Herbie.
//!
//! [`MemoryPage`] parses an HTML document into an arena DOM and implements
//! the [`Page`] protocol over it: XPath and CSS queries, reflected DOM
//! properties, approximate computed style, synthetic event dispatch with
//! bubbling listeners and a live mutation feed. It backs offline runs and
//! the engine's test-suite.
//!
//! ```
//! use herbie_page_memory::MemoryPage;
//!
//! let page = MemoryPage::from_html("https://example.com/", "<button id='go'>Go</button>");
//! assert!(page.find("#go").is_some());
//! ```

mod dom;
mod html;
mod selector;
mod xpath;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use herbie_protocols::{
    DomEvent, ElementRef, EventKind, EventTarget, MutationKind, MutationRecord, Page, PageError,
    PropertyValue, VisibilityInfo,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

use crate::dom::{Dom, NodeId};
use crate::selector::SelectorList;

const MUTATION_CAPACITY: usize = 1024;

const FORM_CONTROLS: &[&str] = &["input", "button", "select", "textarea", "option", "optgroup", "fieldset"];

/// Callback run when an event reaches the target it was registered on.
pub type Listener = Arc<dyn Fn(&MemoryPage, EventTarget, &DomEvent) + Send + Sync>;

/// An event dispatched through the page, in dispatch order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub target: EventTarget,
    pub event: DomEvent,
}

struct Document {
    dom: Dom,
    /// Bumped on every navigation that loads a new document.
    generation: u32,
    url: String,
    title: Option<String>,
    focused: Option<NodeId>,
}

struct Inner {
    doc: RwLock<Document>,
    routes: RwLock<HashMap<String, String>>,
    listeners: RwLock<Vec<(EventTarget, EventKind, Listener)>>,
    events: Mutex<Vec<RecordedEvent>>,
    mutations: broadcast::Sender<MutationRecord>,
}

/// A page held entirely in memory.
#[derive(Clone)]
pub struct MemoryPage {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let doc = self.inner.doc.read();
        f.debug_struct("MemoryPage")
            .field("url", &doc.url)
            .field("nodes", &doc.dom.nodes.len())
            .finish()
    }
}

impl MemoryPage {
    /// An empty document at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let (mutations, _) = broadcast::channel(MUTATION_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                doc: RwLock::new(Document {
                    dom: Dom::new(),
                    generation: 0,
                    url: url.into(),
                    title: None,
                    focused: None,
                }),
                routes: RwLock::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
                events: Mutex::new(Vec::new()),
                mutations,
            }),
        }
    }

    pub fn from_html(url: impl Into<String>, html: &str) -> Self {
        let page = Self::new(url);
        {
            let mut doc = page.inner.doc.write();
            html::parse_into(&mut doc.dom, Dom::ROOT, html);
        }
        page
    }

    /// Serve `html` when the page navigates to `url`.
    pub fn add_route(&self, url: impl Into<String>, html: impl Into<String>) {
        self.inner.routes.write().insert(url.into(), html.into());
    }

    /// First element matching a CSS selector; invalid selectors match nothing.
    pub fn find(&self, selector: &str) -> Option<ElementRef> {
        let list = SelectorList::parse(selector).ok()?;
        let doc = self.inner.doc.read();
        list.select_all(&doc.dom, Dom::ROOT)
            .first()
            .map(|n| to_ref(doc.generation, *n))
    }

    pub fn find_all(&self, selector: &str) -> Vec<ElementRef> {
        let Ok(list) = SelectorList::parse(selector) else {
            return Vec::new();
        };
        let doc = self.inner.doc.read();
        list.select_all(&doc.dom, Dom::ROOT)
            .into_iter()
            .map(|n| to_ref(doc.generation, n))
            .collect()
    }

    /// Replace the element's children with a single text node.
    pub fn set_text(&self, el: ElementRef, text: &str) -> Result<(), PageError> {
        self.mutate(el, |dom, node| {
            for child in dom.children(node).to_vec() {
                dom.detach(child);
            }
            dom.create_text(node, text.to_string());
            Some(MutationKind::ChildList)
        })
    }

    pub fn set_attribute(&self, el: ElementRef, name: &str, value: &str) -> Result<(), PageError> {
        let name = name.to_ascii_lowercase();
        self.mutate_attr(el, &name, |dom, node| {
            dom.set_attr(node, &name, value);
            true
        })
    }

    pub fn remove_attribute(&self, el: ElementRef, name: &str) -> Result<(), PageError> {
        let name = name.to_ascii_lowercase();
        self.mutate_attr(el, &name, |dom, node| dom.remove_attr(node, &name))
    }

    /// Parse `html` and append the resulting nodes to `parent`.
    pub fn append_html(&self, parent: ElementRef, html: &str) -> Result<Vec<ElementRef>, PageError> {
        let mut doc = self.inner.doc.write();
        let generation = doc.generation;
        let node = resolve(&doc, parent)?;
        let before = doc.dom.children(node).len();
        html::parse_into(&mut doc.dom, node, html);
        let added = doc.dom.children(node)[before..]
            .iter()
            .filter(|n| doc.dom.is_element(**n))
            .map(|n| to_ref(generation, *n))
            .collect();
        drop(doc);
        self.emit(MutationRecord {
            kind: MutationKind::ChildList,
            target: parent,
            attribute_name: None,
        });
        Ok(added)
    }

    /// Detach the element from the document. Its handle stays readable.
    pub fn remove(&self, el: ElementRef) -> Result<(), PageError> {
        let mut doc = self.inner.doc.write();
        let generation = doc.generation;
        let node = resolve(&doc, el)?;
        let parent = doc.dom.parent(node);
        doc.dom.detach(node);
        drop(doc);
        if let Some(parent) = parent {
            self.emit(MutationRecord {
                kind: MutationKind::ChildList,
                target: to_ref(generation, parent),
                attribute_name: None,
            });
        }
        Ok(())
    }

    pub fn set_title(&self, title: &str) {
        let generation = {
            let mut doc = self.inner.doc.write();
            doc.title = Some(title.to_string());
            doc.generation
        };
        self.emit(MutationRecord {
            kind: MutationKind::ChildList,
            target: to_ref(generation, Dom::ROOT),
            attribute_name: None,
        });
    }

    /// Give the element an explicit box size.
    pub fn set_size(&self, el: ElementRef, width: f64, height: f64) -> Result<(), PageError> {
        let mut doc = self.inner.doc.write();
        let node = resolve(&doc, el)?;
        if let Some(data) = doc.dom.element_mut(node) {
            data.size = Some((width, height));
        }
        Ok(())
    }

    pub fn set_url(&self, url: &str) {
        self.inner.doc.write().url = url.to_string();
    }

    pub fn focused(&self) -> Option<ElementRef> {
        let doc = self.inner.doc.read();
        doc.focused.map(|n| to_ref(doc.generation, n))
    }

    /// Register a listener for `kind` events reaching `target`.
    pub fn on<F>(&self, target: EventTarget, kind: EventKind, listener: F)
    where
        F: Fn(&MemoryPage, EventTarget, &DomEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.write().push((target, kind, Arc::new(listener)));
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.inner.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.inner.events.lock().clear();
    }

    fn emit(&self, record: MutationRecord) {
        // No receivers is fine.
        let _ = self.inner.mutations.send(record);
    }

    fn mutate<F>(&self, el: ElementRef, f: F) -> Result<(), PageError>
    where
        F: FnOnce(&mut Dom, NodeId) -> Option<MutationKind>,
    {
        let mut doc = self.inner.doc.write();
        let node = resolve(&doc, el)?;
        let kind = f(&mut doc.dom, node);
        drop(doc);
        if let Some(kind) = kind {
            self.emit(MutationRecord {
                kind,
                target: el,
                attribute_name: None,
            });
        }
        Ok(())
    }

    fn mutate_attr<F>(&self, el: ElementRef, name: &str, f: F) -> Result<(), PageError>
    where
        F: FnOnce(&mut Dom, NodeId) -> bool,
    {
        let mut doc = self.inner.doc.write();
        let node = resolve(&doc, el)?;
        let changed = f(&mut doc.dom, node);
        drop(doc);
        if changed {
            self.emit(MutationRecord {
                kind: MutationKind::Attributes,
                target: el,
                attribute_name: Some(name.to_string()),
            });
        }
        Ok(())
    }

    fn with_node<T>(&self, el: ElementRef, f: impl FnOnce(&Document, NodeId) -> T) -> Result<T, PageError> {
        let doc = self.inner.doc.read();
        let node = resolve(&doc, el)?;
        Ok(f(&*doc, node))
    }

    /// Built-in activation behaviour for synthetic clicks.
    fn activate(&self, node: NodeId) {
        let mut doc = self.inner.doc.write();
        let tag = doc.dom.tag(node).unwrap_or_default().to_string();
        match tag.as_str() {
            "input" => {
                let kind = doc.dom.attr(node, "type").unwrap_or("text").to_ascii_lowercase();
                if kind == "checkbox" {
                    let checked = read_property(&doc, node, "checked").is_some_and(|v| v.is_truthy());
                    write_prop(&mut doc.dom, node, "checked", PropertyValue::Bool(!checked));
                } else if kind == "radio" {
                    let group = doc.dom.attr(node, "name").map(str::to_string);
                    if let Some(group) = group {
                        let peers: Vec<NodeId> = doc
                            .dom
                            .descendant_elements(Dom::ROOT)
                            .into_iter()
                            .filter(|n| doc.dom.tag(*n) == Some("input") && doc.dom.attr(*n, "name") == Some(group.as_str()))
                            .collect();
                        for peer in peers {
                            write_prop(&mut doc.dom, peer, "checked", PropertyValue::Bool(false));
                        }
                    }
                    write_prop(&mut doc.dom, node, "checked", PropertyValue::Bool(true));
                }
            }
            "a" => {
                if let Some(PropertyValue::Text(href)) = read_property(&doc, node, "href") {
                    if !href.is_empty() {
                        debug!(url = %href, "Link activated");
                        doc.url = href;
                    }
                }
            }
            _ => {}
        }
    }

    fn load_document(&self, url: &str) {
        let html = self.inner.routes.read().get(url).cloned();
        let mut doc = self.inner.doc.write();
        doc.url = url.to_string();
        if let Some(html) = html {
            let mut dom = Dom::new();
            html::parse_into(&mut dom, Dom::ROOT, &html);
            doc.dom = dom;
            doc.generation += 1;
            doc.title = None;
            doc.focused = None;
            debug!(url, nodes = doc.dom.nodes.len(), "Loaded routed document");
        }
    }
}

fn to_ref(generation: u32, node: NodeId) -> ElementRef {
    ElementRef((u64::from(generation) << 32) | node as u64)
}

fn resolve(doc: &Document, el: ElementRef) -> Result<NodeId, PageError> {
    let generation = (el.0 >> 32) as u32;
    let node = (el.0 & 0xffff_ffff) as NodeId;
    if generation != doc.generation || !doc.dom.exists(node) {
        return Err(PageError::StaleElement(el.0));
    }
    if node != Dom::ROOT && !doc.dom.is_element(node) {
        return Err(PageError::StaleElement(el.0));
    }
    Ok(node)
}

fn resolve_url(base: &str, href: &str) -> String {
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}

fn text(value: Option<&str>) -> Option<PropertyValue> {
    Some(PropertyValue::Text(value.unwrap_or_default().to_string()))
}

fn read_property(doc: &Document, node: NodeId, name: &str) -> Option<PropertyValue> {
    let dom = &doc.dom;
    let data = dom.element(node)?;
    let tag = data.tag.as_str();
    let own = data.props.get(name).cloned();

    match name {
        "value" => match tag {
            "input" => own.or_else(|| text(dom.attr(node, "value"))),
            "textarea" => own.or_else(|| text(Some(&dom.text_content(node)))),
            "select" => {
                let options = dom.options(node);
                let selected = options
                    .iter()
                    .find(|o| dom.option_selected(**o))
                    .or_else(|| {
                        // A select with no explicit choice shows its first option,
                        // unless every option was deselected through the property.
                        let touched = options.iter().any(|o| {
                            dom.element(*o).is_some_and(|e| e.props.contains_key("selected"))
                        });
                        if touched { None } else { options.first() }
                    });
                Some(PropertyValue::Text(selected.map(|o| dom.option_value(*o)).unwrap_or_default()))
            }
            "option" => Some(PropertyValue::Text(dom.option_value(node))),
            "button" => own.or_else(|| text(dom.attr(node, "value"))),
            _ => own,
        },
        "checked" if tag == "input" => own.or_else(|| Some(PropertyValue::Bool(dom.has_attr(node, "checked")))),
        "selected" if tag == "option" => Some(PropertyValue::Bool(dom.option_selected(node))),
        "disabled" if FORM_CONTROLS.contains(&tag) => Some(PropertyValue::Bool(dom.has_attr(node, "disabled"))),
        "required" if matches!(tag, "input" | "select" | "textarea") => {
            Some(PropertyValue::Bool(dom.has_attr(node, "required")))
        }
        "hidden" => Some(PropertyValue::Bool(dom.has_attr(node, "hidden"))),
        "id" | "title" => text(dom.attr(node, name)),
        "className" => text(dom.attr(node, "class")),
        "name" if matches!(tag, "input" | "select" | "textarea" | "button" | "form" | "iframe" | "img" | "a" | "meta" | "fieldset" | "output") => {
            text(dom.attr(node, "name"))
        }
        "placeholder" if matches!(tag, "input" | "textarea") => text(dom.attr(node, "placeholder")),
        "alt" if matches!(tag, "img" | "input" | "area") => text(dom.attr(node, "alt")),
        "type" if tag == "input" => Some(PropertyValue::Text(
            dom.attr(node, "type").unwrap_or("text").to_ascii_lowercase(),
        )),
        "href" if matches!(tag, "a" | "link" | "area") => {
            Some(PropertyValue::Text(dom.attr(node, "href").map(|h| resolve_url(&doc.url, h)).unwrap_or_default()))
        }
        "src" if matches!(tag, "img" | "script" | "iframe" | "input" | "video" | "audio" | "source") => {
            Some(PropertyValue::Text(dom.attr(node, "src").map(|s| resolve_url(&doc.url, s)).unwrap_or_default()))
        }
        "tagName" => Some(PropertyValue::Text(tag.to_ascii_uppercase())),
        "textContent" => Some(PropertyValue::Text(dom.text_content(node))),
        "innerText" => Some(PropertyValue::Text(dom.inner_text(node))),
        _ => own,
    }
}

fn write_prop(dom: &mut Dom, node: NodeId, name: &str, value: PropertyValue) {
    if let Some(data) = dom.element_mut(node) {
        data.props.insert(name.to_string(), value);
    }
}

#[async_trait]
impl Page for MemoryPage {
    async fn evaluate_xpath(
        &self,
        expression: &str,
        context: Option<ElementRef>,
    ) -> Result<Vec<ElementRef>, PageError> {
        let doc = self.inner.doc.read();
        let context = context.map(|c| resolve(&doc, c)).transpose()?;
        let nodes = xpath::evaluate(&doc.dom, expression, context)?;
        Ok(nodes.into_iter().map(|n| to_ref(doc.generation, n)).collect())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>, PageError> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementRef>, PageError> {
        let list = SelectorList::parse(selector)?;
        let doc = self.inner.doc.read();
        Ok(list
            .select_all(&doc.dom, Dom::ROOT)
            .into_iter()
            .map(|n| to_ref(doc.generation, n))
            .collect())
    }

    async fn element_by_id(&self, id: &str) -> Result<Option<ElementRef>, PageError> {
        let doc = self.inner.doc.read();
        Ok(doc.dom.by_id(id).map(|n| to_ref(doc.generation, n)))
    }

    async fn tag_name(&self, el: ElementRef) -> Result<String, PageError> {
        self.with_node(el, |doc, node| doc.dom.tag(node).unwrap_or_default().to_string())
    }

    async fn text_content(&self, el: ElementRef) -> Result<String, PageError> {
        self.with_node(el, |doc, node| doc.dom.text_content(node))
    }

    async fn inner_text(&self, el: ElementRef) -> Result<String, PageError> {
        self.with_node(el, |doc, node| doc.dom.inner_text(node))
    }

    async fn attribute(&self, el: ElementRef, name: &str) -> Result<Option<String>, PageError> {
        let name = name.to_ascii_lowercase();
        self.with_node(el, |doc, node| doc.dom.attr(node, &name).map(str::to_string))
    }

    async fn property(&self, el: ElementRef, name: &str) -> Result<Option<PropertyValue>, PageError> {
        self.with_node(el, |doc, node| read_property(doc, node, name))
    }

    async fn set_property(&self, el: ElementRef, name: &str, value: PropertyValue) -> Result<(), PageError> {
        match name {
            "disabled" | "hidden" | "required" => {
                if value.is_truthy() {
                    self.set_attribute(el, name, "")
                } else {
                    self.remove_attribute(el, name)
                }
            }
            "id" | "title" | "name" | "placeholder" | "alt" => self.set_attribute(el, name, &value.to_js_string()),
            "className" => self.set_attribute(el, "class", &value.to_js_string()),
            "textContent" => self.set_text(el, &value.to_js_string()),
            _ => {
                let mut doc = self.inner.doc.write();
                let node = resolve(&doc, el)?;
                let is_select =
                    name == "value" && doc.dom.tag(node) == Some("select");
                if is_select {
                    let wanted = value.to_js_string();
                    let mut matched = false;
                    for option in doc.dom.options(node) {
                        let hit = !matched && doc.dom.option_value(option) == wanted;
                        matched |= hit;
                        write_prop(&mut doc.dom, option, "selected", PropertyValue::Bool(hit));
                    }
                } else {
                    write_prop(&mut doc.dom, node, name, value);
                }
                Ok(())
            }
        }
    }

    async fn visibility(&self, el: ElementRef) -> Result<VisibilityInfo, PageError> {
        self.with_node(el, |doc, node| {
            let dom = &doc.dom;
            let (width, height) = dom.size(node);
            let hidden_class = std::iter::once(node)
                .chain(dom.ancestors(node))
                .any(|n| dom.classes(n).contains(&"hidden"));
            VisibilityInfo {
                display: dom.display(node),
                visibility: dom.visibility(node),
                opacity: dom.opacity(node),
                width,
                height,
                hidden_class,
            }
        })
    }

    async fn is_connected(&self, el: ElementRef) -> Result<bool, PageError> {
        self.with_node(el, |doc, node| doc.dom.is_connected(node))
    }

    async fn dispatch_event(&self, target: EventTarget, event: DomEvent) -> Result<(), PageError> {
        // Propagation path: target, then (when bubbling) ancestors and the document.
        let (path, node) = {
            let doc = self.inner.doc.read();
            match target {
                EventTarget::Document => (vec![EventTarget::Document], None),
                EventTarget::Element(el) => {
                    let node = resolve(&doc, el)?;
                    let mut path = vec![target];
                    if event.bubbles {
                        for ancestor in doc.dom.ancestors(node) {
                            if ancestor == Dom::ROOT {
                                path.push(EventTarget::Document);
                            } else {
                                path.push(EventTarget::Element(to_ref(doc.generation, ancestor)));
                            }
                        }
                    }
                    (path, Some(node))
                }
            }
        };

        self.inner.events.lock().push(RecordedEvent {
            target,
            event: event.clone(),
        });

        for current in path {
            let listeners: Vec<Listener> = self
                .inner
                .listeners
                .read()
                .iter()
                .filter(|(t, k, _)| *t == current && *k == event.kind)
                .map(|(_, _, l)| Arc::clone(l))
                .collect();
            for listener in listeners {
                listener(self, target, &event);
            }
        }

        if let (Some(node), EventKind::Click) = (node, event.kind) {
            self.activate(node);
        }
        Ok(())
    }

    async fn focus(&self, el: ElementRef) -> Result<(), PageError> {
        let previous = {
            let mut doc = self.inner.doc.write();
            let node = resolve(&doc, el)?;
            let previous = doc.focused.replace(node);
            previous.filter(|p| *p != node).map(|p| to_ref(doc.generation, p))
        };
        if let Some(previous) = previous {
            self.dispatch_event(EventTarget::Element(previous), DomEvent::new(EventKind::Blur, false))
                .await?;
        }
        self.dispatch_event(EventTarget::Element(el), DomEvent::new(EventKind::Focus, false))
            .await
    }

    async fn blur(&self, el: ElementRef) -> Result<(), PageError> {
        let was_focused = {
            let mut doc = self.inner.doc.write();
            let node = resolve(&doc, el)?;
            if doc.focused == Some(node) {
                doc.focused = None;
                true
            } else {
                false
            }
        };
        if was_focused {
            self.dispatch_event(EventTarget::Element(el), DomEvent::new(EventKind::Blur, false))
                .await?;
        }
        Ok(())
    }

    async fn title(&self) -> Result<String, PageError> {
        let doc = self.inner.doc.read();
        if let Some(title) = &doc.title {
            return Ok(title.clone());
        }
        let title = doc
            .dom
            .first_element_by_tag("title")
            .map(|t| doc.dom.text_content(t).split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        Ok(title)
    }

    async fn url(&self) -> Result<String, PageError> {
        Ok(self.inner.doc.read().url.clone())
    }

    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        let current = self.inner.doc.read().url.clone();
        let target = resolve_url(&current, url);
        if url::Url::parse(&target).is_err() {
            return Err(PageError::NavigationFailed(url.to_string()));
        }
        self.load_document(&target);
        Ok(())
    }

    fn mutations(&self) -> Option<broadcast::Receiver<MutationRecord>> {
        Some(self.inner.mutations.subscribe())
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
