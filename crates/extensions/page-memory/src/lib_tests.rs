use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

const FORM: &str = r#"
<html>
  <head><title> Checkout </title></head>
  <body>
    <form id="f">
      <label for="email">Email:</label>
      <input id="email" name="email" value="a@b.c">
      <input id="agree" type="checkbox">
      <select id="country">
        <option value="us">United States</option>
        <option value="fr" selected>France</option>
      </select>
      <button id="submit" disabled>Submit</button>
      <a id="help" href="/help">Help</a>
    </form>
    <div id="ghost" style="display: none"><span id="inner">secret</span></div>
    <div class="hidden"><p id="masked">masked</p></div>
  </body>
</html>
"#;

fn page() -> MemoryPage {
    MemoryPage::from_html("https://shop.example.com/cart", FORM)
}

fn el(page: &MemoryPage, selector: &str) -> ElementRef {
    page.find(selector).unwrap()
}

#[tokio::test]
async fn test_queries() {
    let page = page();
    let email = el(&page, "#email");

    assert_eq!(page.element_by_id("email").await.unwrap(), Some(email));
    assert_eq!(page.evaluate_xpath("//input[@name='email']", None).await.unwrap(), vec![email]);
    assert_eq!(page.query_selector_all("input").await.unwrap().len(), 2);
    assert!(matches!(
        page.query_selector("Submit!").await,
        Err(PageError::InvalidSelector(_))
    ));
    assert!(matches!(
        page.evaluate_xpath("//[", None).await,
        Err(PageError::InvalidXPath(_))
    ));
}

#[tokio::test]
async fn test_properties_reflect_dom() {
    let page = page();
    let email = el(&page, "#email");
    let submit = el(&page, "#submit");
    let country = el(&page, "#country");
    let help = el(&page, "#help");

    assert_eq!(
        page.property(email, "value").await.unwrap(),
        Some(PropertyValue::Text("a@b.c".into()))
    );
    assert_eq!(
        page.property(submit, "disabled").await.unwrap(),
        Some(PropertyValue::Bool(true))
    );
    assert_eq!(
        page.property(country, "value").await.unwrap(),
        Some(PropertyValue::Text("fr".into()))
    );
    assert_eq!(
        page.property(help, "href").await.unwrap(),
        Some(PropertyValue::Text("https://shop.example.com/help".into()))
    );
    // `class` is not a DOM property.
    assert_eq!(page.property(email, "class").await.unwrap(), None);
    assert_eq!(page.title().await.unwrap(), "Checkout");
}

#[tokio::test]
async fn test_set_property_value_and_select() {
    let page = page();
    let email = el(&page, "#email");
    let country = el(&page, "#country");

    page.set_property(email, "value", PropertyValue::Text("x@y.z".into()))
        .await
        .unwrap();
    assert_eq!(
        page.property(email, "value").await.unwrap(),
        Some(PropertyValue::Text("x@y.z".into()))
    );
    // The attribute keeps the default value.
    assert_eq!(page.attribute(email, "value").await.unwrap().as_deref(), Some("a@b.c"));

    page.set_property(country, "value", PropertyValue::Text("us".into()))
        .await
        .unwrap();
    assert_eq!(
        page.property(country, "value").await.unwrap(),
        Some(PropertyValue::Text("us".into()))
    );

    page.set_property(country, "value", PropertyValue::Text("nowhere".into()))
        .await
        .unwrap();
    assert_eq!(
        page.property(country, "value").await.unwrap(),
        Some(PropertyValue::Text(String::new()))
    );
}

#[tokio::test]
async fn test_visibility() {
    let page = page();
    let email = el(&page, "#email");
    let inner = el(&page, "#inner");
    let masked = el(&page, "#masked");

    assert!(page.visibility(email).await.unwrap().is_visible());

    let ghost = page.visibility(inner).await.unwrap();
    assert!(!ghost.is_rendered());
    assert_eq!(ghost.width, 0.0);

    let classed = page.visibility(masked).await.unwrap();
    assert!(classed.is_rendered());
    assert!(!classed.is_visible());

    page.set_size(email, 0.0, 0.0).unwrap();
    assert!(!page.visibility(email).await.unwrap().is_rendered());
}

#[tokio::test]
async fn test_click_toggles_checkbox_and_bubbles() {
    let page = page();
    let agree = el(&page, "#agree");
    let form = el(&page, "#f");

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    page.on(EventTarget::Element(form), EventKind::Click, move |_, target, _| {
        assert_eq!(target, EventTarget::Element(agree));
        counter.fetch_add(1, Ordering::SeqCst);
    });

    page.dispatch_event(EventTarget::Element(agree), DomEvent::mouse(EventKind::Click))
        .await
        .unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(
        page.property(agree, "checked").await.unwrap(),
        Some(PropertyValue::Bool(true))
    );

    // Non-bubbling events stay on the target.
    page.dispatch_event(EventTarget::Element(agree), DomEvent::new(EventKind::Click, false))
        .await
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(page.events().len(), 2);
}

#[tokio::test]
async fn test_listener_can_mutate_page() {
    let page = page();
    let submit = el(&page, "#submit");
    let body = el(&page, "body");

    page.on(EventTarget::Element(submit), EventKind::Click, move |page, _, _| {
        page.append_html(body, "<p id='done'>Saved</p>").unwrap();
    });
    page.dispatch_event(EventTarget::Element(submit), DomEvent::mouse(EventKind::Click))
        .await
        .unwrap();

    assert!(page.find("#done").is_some());
}

#[tokio::test]
async fn test_focus_and_blur_events() {
    let page = page();
    let email = el(&page, "#email");
    let agree = el(&page, "#agree");

    page.focus(email).await.unwrap();
    page.focus(agree).await.unwrap();
    page.blur(agree).await.unwrap();

    let kinds: Vec<EventKind> = page.events().into_iter().map(|e| e.event.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Focus, EventKind::Blur, EventKind::Focus, EventKind::Blur]
    );
    assert_eq!(page.focused(), None);
}

#[tokio::test]
async fn test_mutation_feed() {
    let page = page();
    let mut rx = page.mutations().unwrap();
    let email = el(&page, "#email");
    let ghost = el(&page, "#ghost");

    page.set_attribute(email, "placeholder", "you@example.com").unwrap();
    page.remove(ghost).unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind, MutationKind::Attributes);
    assert_eq!(first.attribute_name.as_deref(), Some("placeholder"));
    assert_eq!(rx.recv().await.unwrap().kind, MutationKind::ChildList);

    assert!(!page.is_connected(ghost).await.unwrap());
    assert_eq!(page.text_content(ghost).await.unwrap(), "secret");
}

#[tokio::test]
async fn test_value_property_is_not_a_mutation() {
    let page = page();
    let mut rx = page.mutations().unwrap();
    let email = el(&page, "#email");

    page.set_property(email, "value", PropertyValue::Text("new".into()))
        .await
        .unwrap();
    assert!(rx.try_recv().is_err());

    page.set_property(email, "disabled", PropertyValue::Bool(true))
        .await
        .unwrap();
    assert_eq!(rx.try_recv().unwrap().attribute_name.as_deref(), Some("disabled"));
}

#[tokio::test]
async fn test_navigate_routes_and_stale_handles() {
    let page = page();
    let email = el(&page, "#email");
    page.add_route("https://shop.example.com/done", "<title>Done</title><h1>Thanks</h1>");

    page.navigate("/done").await.unwrap();

    assert_eq!(page.url().await.unwrap(), "https://shop.example.com/done");
    assert_eq!(page.title().await.unwrap(), "Done");
    assert!(matches!(
        page.text_content(email).await,
        Err(PageError::StaleElement(_))
    ));
}

#[tokio::test]
async fn test_link_click_updates_url() {
    let page = page();
    let help = el(&page, "#help");
    page.dispatch_event(EventTarget::Element(help), DomEvent::mouse(EventKind::Click))
        .await
        .unwrap();
    assert_eq!(page.url().await.unwrap(), "https://shop.example.com/help");
}
