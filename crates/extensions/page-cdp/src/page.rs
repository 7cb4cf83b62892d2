//! [`Page`] implementation over a CDP page session.

use async_trait::async_trait;
use herbie_protocols::{
    DomEvent, ElementRef, EventTarget, MutationRecord, Page, PageError, PropertyValue,
    VisibilityInfo,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::CdpError;
use crate::script;
use crate::session::PageSession;

/// A live Chrome tab.
///
/// Has no mutation feed, so passive verification polls it.
pub struct CdpPage {
    session: PageSession,
}

impl CdpPage {
    pub fn new(session: PageSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &PageSession {
        &self.session
    }

    async fn run(&self, body: &str, args: Value) -> Result<Value, PageError> {
        let expression = script::invoke(body, &args);
        trace!(len = expression.len(), "Evaluating helper");
        Ok(self.session.evaluate(&expression).await?)
    }

    async fn run_as<T: DeserializeOwned>(&self, body: &str, args: Value) -> Result<T, PageError> {
        let value = self.run(body, args).await?;
        serde_json::from_value(value).map_err(|e| PageError::Backend(e.to_string()))
    }

    async fn string(&self, expression: &str) -> Result<String, PageError> {
        let value = self.session.evaluate(expression).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

fn element_ref(value: Value) -> Result<Option<ElementRef>, PageError> {
    match value {
        Value::Null => Ok(None),
        other => other
            .as_u64()
            .map(|id| Some(ElementRef(id)))
            .ok_or_else(|| invalid("element handle", &other)),
    }
}

fn property_value(value: Value) -> Result<Option<PropertyValue>, PageError> {
    Ok(match value {
        Value::Null => None,
        Value::Bool(b) => Some(PropertyValue::Bool(b)),
        Value::Number(n) => Some(PropertyValue::Number(n.as_f64().unwrap_or(f64::NAN))),
        Value::String(s) => Some(PropertyValue::Text(s)),
        other => return Err(invalid("property value", &other)),
    })
}

fn invalid(what: &str, value: &Value) -> PageError {
    PageError::Backend(CdpError::InvalidResponse(format!("expected {what}, got {value}")).to_string())
}

fn target_arg(target: EventTarget) -> Value {
    match target {
        EventTarget::Element(el) => json!(el.0),
        EventTarget::Document => Value::Null,
    }
}

#[async_trait]
impl Page for CdpPage {
    async fn evaluate_xpath(
        &self,
        expression: &str,
        context: Option<ElementRef>,
    ) -> Result<Vec<ElementRef>, PageError> {
        let ids: Vec<u64> = self
            .run_as(
                script::EVALUATE_XPATH,
                json!({"expr": expression, "ctx": context.map(|c| c.0)}),
            )
            .await?;
        Ok(ids.into_iter().map(ElementRef).collect())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>, PageError> {
        element_ref(self.run(script::QUERY_SELECTOR, json!({"sel": selector})).await?)
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementRef>, PageError> {
        let ids: Vec<u64> = self
            .run_as(script::QUERY_SELECTOR_ALL, json!({"sel": selector}))
            .await?;
        Ok(ids.into_iter().map(ElementRef).collect())
    }

    async fn element_by_id(&self, id: &str) -> Result<Option<ElementRef>, PageError> {
        element_ref(self.run(script::ELEMENT_BY_ID, json!({"id": id})).await?)
    }

    async fn tag_name(&self, el: ElementRef) -> Result<String, PageError> {
        self.run_as(script::TAG_NAME, json!({"el": el.0})).await
    }

    async fn text_content(&self, el: ElementRef) -> Result<String, PageError> {
        self.run_as(script::TEXT_CONTENT, json!({"el": el.0})).await
    }

    async fn inner_text(&self, el: ElementRef) -> Result<String, PageError> {
        self.run_as(script::INNER_TEXT, json!({"el": el.0})).await
    }

    async fn attribute(&self, el: ElementRef, name: &str) -> Result<Option<String>, PageError> {
        self.run_as(script::ATTRIBUTE, json!({"el": el.0, "name": name}))
            .await
    }

    async fn property(&self, el: ElementRef, name: &str) -> Result<Option<PropertyValue>, PageError> {
        property_value(
            self.run(script::PROPERTY, json!({"el": el.0, "name": name}))
                .await?,
        )
    }

    async fn set_property(
        &self,
        el: ElementRef,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), PageError> {
        self.run(
            script::SET_PROPERTY,
            json!({"el": el.0, "name": name, "value": value}),
        )
        .await
        .map(drop)
    }

    async fn visibility(&self, el: ElementRef) -> Result<VisibilityInfo, PageError> {
        self.run_as(script::VISIBILITY, json!({"el": el.0})).await
    }

    async fn is_connected(&self, el: ElementRef) -> Result<bool, PageError> {
        match self.run_as(script::IS_CONNECTED, json!({"el": el.0})).await {
            Err(PageError::StaleElement(_)) => Ok(false),
            other => other,
        }
    }

    async fn dispatch_event(&self, target: EventTarget, event: DomEvent) -> Result<(), PageError> {
        let args = json!({
            "el": target_arg(target),
            "interface": event.kind.interface(),
            "event": {
                "kind": event.kind.as_str(),
                "bubbles": event.bubbles,
                "cancelable": event.cancelable,
                "button": event.button,
                "key": event.key,
                "keyCode": event.key_code,
            },
        });
        self.run(script::DISPATCH_EVENT, strip_nulls(args)).await.map(drop)
    }

    async fn focus(&self, el: ElementRef) -> Result<(), PageError> {
        self.run(script::FOCUS, json!({"el": el.0})).await.map(drop)
    }

    async fn blur(&self, el: ElementRef) -> Result<(), PageError> {
        self.run(script::BLUR, json!({"el": el.0})).await.map(drop)
    }

    async fn title(&self) -> Result<String, PageError> {
        self.string("document.title").await
    }

    async fn url(&self) -> Result<String, PageError> {
        self.string("window.location.href").await
    }

    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        Ok(self.session.navigate(url).await?)
    }

    fn mutations(&self) -> Option<broadcast::Receiver<MutationRecord>> {
        None
    }
}

/// Drop null members of the `event` object so the helper sees them as
/// `undefined`.
fn strip_nulls(mut args: Value) -> Value {
    if let Some(event) = args.get_mut("event").and_then(Value::as_object_mut) {
        event.retain(|_, v| !v.is_null());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use herbie_protocols::EventKind;

    #[test]
    fn test_element_ref_decoding() {
        assert_eq!(element_ref(Value::Null).unwrap(), None);
        assert_eq!(
            element_ref(json!(4294967301u64)).unwrap(),
            Some(ElementRef(4294967301))
        );
        assert!(matches!(element_ref(json!("x")), Err(PageError::Backend(_))));
    }

    #[test]
    fn test_property_decoding() {
        assert_eq!(property_value(Value::Null).unwrap(), None);
        assert_eq!(
            property_value(json!(true)).unwrap(),
            Some(PropertyValue::Bool(true))
        );
        assert_eq!(
            property_value(json!(2)).unwrap(),
            Some(PropertyValue::Number(2.0))
        );
        assert_eq!(
            property_value(json!("Bob")).unwrap(),
            Some(PropertyValue::Text("Bob".into()))
        );
        assert!(property_value(json!([1])).is_err());
    }

    #[test]
    fn test_visibility_payload_matches_protocol() {
        let info: VisibilityInfo = serde_json::from_value(json!({
            "display": "block",
            "visibility": "visible",
            "opacity": 1.0,
            "width": 80.0,
            "height": 20.0,
            "hiddenClass": false,
        }))
        .unwrap();
        assert!(info.is_visible());
    }

    #[test]
    fn test_event_args_drop_absent_fields() {
        let event = DomEvent::mouse(EventKind::Click);
        let args = strip_nulls(json!({
            "el": target_arg(EventTarget::Document),
            "event": {"kind": event.kind.as_str(), "button": event.button, "key": event.key},
        }));
        assert!(args["el"].is_null());
        assert_eq!(args["event"]["button"], 0);
        assert!(args["event"].get("key").is_none());
    }
}
