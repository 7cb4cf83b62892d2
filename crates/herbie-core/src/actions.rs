//! Synthetic DOM actions.
//!
//! Each primitive fires the same event sequence a user interaction would,
//! so page scripts listening for `input`, `change` or `mouseenter` react as
//! they do for real input.

use herbie_protocols::{
    DomEvent, ElementRef, EventKind, EventTarget, Page, PageError, PropertyValue,
};

use crate::locator::xpath_literal;

pub async fn click(page: &dyn Page, el: ElementRef) -> Result<(), PageError> {
    page.dispatch_event(EventTarget::Element(el), DomEvent::mouse(EventKind::Click))
        .await
}

/// Focus, clear, fill and blur a form control.
pub async fn type_text(page: &dyn Page, el: ElementRef, text: &str) -> Result<(), PageError> {
    let target = EventTarget::Element(el);
    page.focus(el).await?;
    page.set_property(el, "value", PropertyValue::Text(String::new()))
        .await?;
    page.dispatch_event(target, DomEvent::new(EventKind::Input, true))
        .await?;
    page.set_property(el, "value", PropertyValue::Text(text.to_string()))
        .await?;
    page.dispatch_event(target, DomEvent::new(EventKind::Change, true))
        .await?;
    page.blur(el).await
}

/// Choose the option of a `<select>` whose value is `value`.
pub async fn select(page: &dyn Page, el: ElementRef, value: &str) -> Result<(), PageError> {
    page.focus(el).await?;
    page.set_property(el, "value", PropertyValue::Text(value.to_string()))
        .await?;
    let option = format!(".//option[@value={}]", xpath_literal(value));
    if let Some(opt) = page.evaluate_xpath(&option, Some(el)).await?.into_iter().next() {
        page.set_property(opt, "selected", PropertyValue::Bool(true))
            .await?;
    }
    page.dispatch_event(EventTarget::Element(el), DomEvent::new(EventKind::Change, true))
        .await
}

pub async fn mouseover(page: &dyn Page, el: ElementRef) -> Result<(), PageError> {
    let target = EventTarget::Element(el);
    page.dispatch_event(target, DomEvent::mouse(EventKind::MouseEnter))
        .await?;
    page.dispatch_event(target, DomEvent::mouse(EventKind::MouseLeave))
        .await
}

/// `keydown` then `keyup` for `key` on `target`.
pub async fn press(page: &dyn Page, target: EventTarget, key: &str) -> Result<(), PageError> {
    page.dispatch_event(target, DomEvent::keyboard(EventKind::KeyDown, key))
        .await?;
    page.dispatch_event(target, DomEvent::keyboard(EventKind::KeyUp, key))
        .await
}

pub async fn navigate(page: &dyn Page, url: &str) -> Result<(), PageError> {
    page.navigate(url).await
}
