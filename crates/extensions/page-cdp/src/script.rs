//! In-page helper scripts.
//!
//! Element handles live in a registry on `window.__herbie`. A handle is
//! `epoch * 2^32 + index`, where the epoch is drawn when the registry is
//! created, so handles from a previous document fail as stale instead of
//! aliasing new elements.

use serde_json::Value;

/// Creates the registry once per document and evaluates to it.
const REGISTRY: &str = r#"(() => {
  if (!window.__herbie) {
    const epoch = 1 + Math.floor(Math.random() * 0xfffff);
    window.__herbie = {
      epoch,
      refs: [],
      put(el) {
        let i = this.refs.indexOf(el);
        if (i < 0) i = this.refs.push(el) - 1;
        return this.epoch * 4294967296 + i;
      },
      get(ref) {
        const i = ref % 4294967296;
        const el = (ref - i) / 4294967296 === this.epoch ? this.refs[i] : undefined;
        if (!el) throw new Error("herbie:stale:" + ref);
        return el;
      },
    };
  }
  return window.__herbie;
})()"#;

/// Wrap `body` as a function of the registry `h` and the arguments `a`.
///
/// `args` is embedded as a JSON literal, which is valid JavaScript.
pub(crate) fn invoke(body: &str, args: &Value) -> String {
    format!("((h, a) => {{ {body} }})({REGISTRY}, {args})")
}

pub(crate) const EVALUATE_XPATH: &str = r#"
  const ctx = a.ctx === null ? document : h.get(a.ctx);
  const snap = document.evaluate(a.expr, ctx, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
  const out = [];
  for (let i = 0; i < snap.snapshotLength; i++) {
    const node = snap.snapshotItem(i);
    if (node.nodeType === Node.ELEMENT_NODE) out.push(h.put(node));
  }
  return out;
"#;

pub(crate) const QUERY_SELECTOR: &str = r#"
  const el = document.querySelector(a.sel);
  return el ? h.put(el) : null;
"#;

pub(crate) const QUERY_SELECTOR_ALL: &str =
    "return Array.from(document.querySelectorAll(a.sel), (el) => h.put(el));";

pub(crate) const ELEMENT_BY_ID: &str = r#"
  const el = document.getElementById(a.id);
  return el ? h.put(el) : null;
"#;

pub(crate) const TAG_NAME: &str = "return h.get(a.el).tagName.toLowerCase();";

pub(crate) const TEXT_CONTENT: &str = "return h.get(a.el).textContent || '';";

pub(crate) const INNER_TEXT: &str = "return h.get(a.el).innerText || '';";

pub(crate) const ATTRIBUTE: &str = "return h.get(a.el).getAttribute(a.name);";

/// Primitives pass through; `undefined` is `null`; anything else is `String(v)`.
pub(crate) const PROPERTY: &str = r#"
  const v = h.get(a.el)[a.name];
  if (v === undefined) return null;
  if (typeof v === "boolean" || typeof v === "number" || typeof v === "string") return v;
  return String(v);
"#;

pub(crate) const SET_PROPERTY: &str = "h.get(a.el)[a.name] = a.value; return null;";

pub(crate) const VISIBILITY: &str = r#"
  const el = h.get(a.el);
  const style = getComputedStyle(el);
  const rect = el.getBoundingClientRect();
  return {
    display: style.display || "",
    visibility: style.visibility || "",
    opacity: parseFloat(style.opacity || "1"),
    width: rect.width,
    height: rect.height,
    hiddenClass: el.closest(".hidden") !== null,
  };
"#;

pub(crate) const IS_CONNECTED: &str = "return h.get(a.el).isConnected;";

pub(crate) const DISPATCH_EVENT: &str = r#"
  const target = a.el === null ? document : h.get(a.el);
  const e = a.event;
  const init = { bubbles: e.bubbles, cancelable: e.cancelable };
  if (e.button !== undefined) init.button = e.button;
  if (e.key !== undefined) init.key = e.key;
  if (e.keyCode !== undefined) init.keyCode = e.keyCode;
  const Ctor = window[a.interface] || Event;
  target.dispatchEvent(new Ctor(e.kind, init));
  return null;
"#;

pub(crate) const FOCUS: &str = "h.get(a.el).focus(); return null;";

pub(crate) const BLUR: &str = "h.get(a.el).blur(); return null;";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invoke_embeds_args_as_json() {
        let script = invoke(QUERY_SELECTOR, &json!({"sel": "a[href=\"/x\"]"}));
        assert!(script.starts_with("((h, a) => {"));
        assert!(script.contains(r#"{"sel":"a[href=\"/x\"]"}"#));
        assert!(script.contains("window.__herbie"));
    }

    #[test]
    fn test_registry_throws_stale_marker() {
        assert!(REGISTRY.contains(crate::error::STALE_MARKER));
    }
}
