//! Page protocol definitions.
//!
//! A [`Page`] is the document the engine drives. Elements are addressed
//! through opaque [`ElementRef`] handles issued by the backend; a handle
//! stays valid after its element leaves the document, so watchers can
//! notice removal through [`Page::is_connected`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::PageError;

/// Opaque element handle issued by a page backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementRef(pub u64);

/// DOM property value. `None` in [`Page::property`] stands for `undefined`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// String conversion with JavaScript `String(x)` semantics.
    pub fn to_js_string(&self) -> String {
        match self {
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                format!("{}", *n as i64)
            }
            PropertyValue::Number(n) => n.to_string(),
            PropertyValue::Text(s) => s.clone(),
        }
    }

    /// JavaScript truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            PropertyValue::Bool(b) => *b,
            PropertyValue::Number(n) => *n != 0.0 && !n.is_nan(),
            PropertyValue::Text(s) => !s.is_empty(),
        }
    }
}

/// Computed style and box metrics relevant to visibility checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityInfo {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub width: f64,
    pub height: f64,
    /// The element or one of its ancestors carries the `hidden` class.
    pub hidden_class: bool,
}

impl VisibilityInfo {
    /// Displayed, not visibility-hidden and with a non-empty box.
    pub fn is_rendered(&self) -> bool {
        self.display != "none" && self.visibility != "hidden" && self.width > 0.0 && self.height > 0.0
    }

    /// Rendered, not fully transparent and not inside a `.hidden` subtree.
    pub fn is_visible(&self) -> bool {
        self.is_rendered() && self.opacity != 0.0 && !self.hidden_class
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Click,
    Input,
    Change,
    Focus,
    Blur,
    MouseEnter,
    MouseLeave,
    KeyDown,
    KeyUp,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Input => "input",
            EventKind::Change => "change",
            EventKind::Focus => "focus",
            EventKind::Blur => "blur",
            EventKind::MouseEnter => "mouseenter",
            EventKind::MouseLeave => "mouseleave",
            EventKind::KeyDown => "keydown",
            EventKind::KeyUp => "keyup",
        }
    }

    /// DOM interface the event is constructed with.
    pub fn interface(&self) -> &'static str {
        match self {
            EventKind::Click | EventKind::MouseEnter | EventKind::MouseLeave => "MouseEvent",
            EventKind::KeyDown | EventKind::KeyUp => "KeyboardEvent",
            EventKind::Focus | EventKind::Blur => "FocusEvent",
            EventKind::Input | EventKind::Change => "Event",
        }
    }
}

/// A synthetic event to dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomEvent {
    pub kind: EventKind,
    pub bubbles: bool,
    pub cancelable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_code: Option<u32>,
}

impl DomEvent {
    /// A plain event with the given bubbling behaviour.
    pub fn new(kind: EventKind, bubbles: bool) -> Self {
        Self {
            kind,
            bubbles,
            cancelable: false,
            button: None,
            key: None,
            key_code: None,
        }
    }

    /// Primary-button mouse event that bubbles and can be cancelled.
    pub fn mouse(kind: EventKind) -> Self {
        Self {
            cancelable: true,
            button: Some(0),
            ..Self::new(kind, true)
        }
    }

    /// Keyboard event; `keyCode` is the char code of the key's first character.
    pub fn keyboard(kind: EventKind, key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            key_code: Some(key.chars().next().map(u32::from).unwrap_or(0)),
            ..Self::new(kind, false)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Element(ElementRef),
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// A change observed in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: ElementRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
}

/// A browser page the engine drives.
#[async_trait]
pub trait Page: Send + Sync {
    /// Evaluate an XPath and return matching elements in document order.
    ///
    /// With `context`, relative paths are evaluated from that element.
    async fn evaluate_xpath(
        &self,
        expression: &str,
        context: Option<ElementRef>,
    ) -> Result<Vec<ElementRef>, PageError>;

    /// First element matching a CSS selector.
    ///
    /// Fails with [`PageError::InvalidSelector`] when the selector cannot be parsed.
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>, PageError>;

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementRef>, PageError>;

    async fn element_by_id(&self, id: &str) -> Result<Option<ElementRef>, PageError>;

    /// Lowercase tag name.
    async fn tag_name(&self, el: ElementRef) -> Result<String, PageError>;

    async fn text_content(&self, el: ElementRef) -> Result<String, PageError>;

    /// Rendered text, skipping hidden subtrees.
    async fn inner_text(&self, el: ElementRef) -> Result<String, PageError>;

    async fn attribute(&self, el: ElementRef, name: &str) -> Result<Option<String>, PageError>;

    async fn property(&self, el: ElementRef, name: &str) -> Result<Option<PropertyValue>, PageError>;

    async fn set_property(
        &self,
        el: ElementRef,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), PageError>;

    async fn visibility(&self, el: ElementRef) -> Result<VisibilityInfo, PageError>;

    async fn is_connected(&self, el: ElementRef) -> Result<bool, PageError>;

    async fn dispatch_event(&self, target: EventTarget, event: DomEvent) -> Result<(), PageError>;

    /// Focus the element, firing `focus`.
    async fn focus(&self, el: ElementRef) -> Result<(), PageError>;

    /// Remove focus from the element, firing `blur`.
    async fn blur(&self, el: ElementRef) -> Result<(), PageError>;

    async fn title(&self) -> Result<String, PageError>;

    async fn url(&self) -> Result<String, PageError>;

    async fn navigate(&self, url: &str) -> Result<(), PageError>;

    /// Live mutation feed, or `None` when the backend can only be polled.
    fn mutations(&self) -> Option<broadcast::Receiver<MutationRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> VisibilityInfo {
        VisibilityInfo {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            width: 10.0,
            height: 10.0,
            hidden_class: false,
        }
    }

    #[test]
    fn test_visibility_rules() {
        assert!(info().is_visible());

        let zero = VisibilityInfo { width: 0.0, ..info() };
        assert!(!zero.is_rendered());

        let transparent = VisibilityInfo { opacity: 0.0, ..info() };
        assert!(transparent.is_rendered());
        assert!(!transparent.is_visible());

        let classed = VisibilityInfo { hidden_class: true, ..info() };
        assert!(!classed.is_visible());

        let none = VisibilityInfo { display: "none".to_string(), ..info() };
        assert!(!none.is_rendered());
    }

    #[test]
    fn test_property_js_string() {
        assert_eq!(PropertyValue::Bool(true).to_js_string(), "true");
        assert_eq!(PropertyValue::Number(3.0).to_js_string(), "3");
        assert_eq!(PropertyValue::Number(1.5).to_js_string(), "1.5");
        assert_eq!(PropertyValue::Text("x".into()).to_js_string(), "x");
    }

    #[test]
    fn test_keyboard_event_key_code() {
        let ev = DomEvent::keyboard(EventKind::KeyDown, "Enter");
        assert_eq!(ev.key_code, Some(69));
        assert!(!ev.bubbles);
    }

    #[test]
    fn test_mouse_event_defaults() {
        let ev = DomEvent::mouse(EventKind::Click);
        assert!(ev.bubbles);
        assert!(ev.cancelable);
        assert_eq!(ev.button, Some(0));
        assert_eq!(ev.kind.interface(), "MouseEvent");
    }
}
