use super::*;
use async_trait::async_trait;
use std::collections::HashMap;

fn cmd(code: &[&str]) -> Command {
    let mut cmd = Command::new(0, code.join(" "), 5000);
    cmd.code = code.iter().map(|s| s.to_string()).collect();
    cmd
}

#[test]
fn test_registrable_domain() {
    assert_eq!(registrable_domain("sub.a.example.co.uk"), "co.uk");
    assert_eq!(registrable_domain("hrithik.webchartnow.com"), "webchartnow.com");
    assert_eq!(registrable_domain("example.com"), "example.com");
    assert_eq!(registrable_domain("localhost"), "localhost");
}

#[test]
fn test_domain_for_url() {
    assert_eq!(
        domain_for_url("https://www.google.com/search?q=x").as_deref(),
        Some("google.com")
    );
    assert_eq!(domain_for_url("not a url"), None);
    assert_eq!(domain_for_url("about:blank"), None);
}

#[test]
fn test_local_shadows_global() {
    let keywords = KeywordSet::new(
        vec![Keyword::new("save", "//button[@id='global']")],
        vec![Keyword::new("save", "//button[@id='local']")],
    );
    let mut c = cmd(&["click", "in", "'save'"]);
    resolve_keywords(&mut c, &keywords);
    assert_eq!(c.code[2], "//button[@id='local']");
}

#[test]
fn test_xpath_operand_untouched() {
    let keywords = KeywordSet::new(vec![Keyword::new("//a", "//b")], vec![]);
    let mut c = cmd(&["click", "in", "'//a'"]);
    resolve_keywords(&mut c, &keywords);
    assert_eq!(c.code[2], "'//a'");
}

#[test]
fn test_unknown_keyword_untouched() {
    let mut c = cmd(&["click", "in", "'Submit'"]);
    resolve_keywords(&mut c, &KeywordSet::default());
    assert_eq!(c.code[2], "'Submit'");
}

#[test]
fn test_variable_substitution_skips_typed_value() {
    let keywords = KeywordSet::new(
        vec![Keyword::new("cell", "//tr[td={$}]/td[{$}]")],
        vec![],
    );
    let mut c = cmd(&["type", "'Bob'", "in", "'cell'", "'Alice'", "'2'"]);
    resolve_keywords(&mut c, &keywords);
    // The keyword name itself is a quoted literal and binds first.
    assert_eq!(c.code[3], "//tr[td='cell']/td['Alice']");

    let mut click = cmd(&["click", "in", "'cell'", "'x'"]);
    resolve_keywords(&mut click, &keywords);
    assert_eq!(click.code[2], "//tr[td='cell']/td['x']");
}

#[test]
fn test_verify_truncates_and_mirrors_locator() {
    let keywords = KeywordSet::new(vec![Keyword::new("banner", "//div[@id='banner']")], vec![]);
    let mut c = cmd(&["verify", "\"Hi\"", "in", "\"banner\"", "in", "\"junk\""]);
    c.verify_locator = Some("banner".to_string());
    resolve_keywords(&mut c, &keywords);
    assert_eq!(c.code, vec!["verify", "\"Hi\"", "in", "//div[@id='banner']"]);
    assert_eq!(c.verify_locator.as_deref(), Some("//div[@id='banner']"));
}

#[test]
fn test_resolution_is_idempotent() {
    let keywords = KeywordSet::new(vec![Keyword::new("login", "//button[1]")], vec![]);
    let mut once = cmd(&["click", "in", "'login'"]);
    resolve_keywords(&mut once, &keywords);
    let mut twice = once.clone();
    resolve_keywords(&mut twice, &keywords);
    assert_eq!(once, twice);
}

#[test]
fn test_no_operand_after_in() {
    let mut c = cmd(&["click", "in"]);
    resolve_keywords(&mut c, &KeywordSet::new(vec![Keyword::new("in", "//x")], vec![]));
    assert_eq!(c.code, vec!["click", "in"]);
}

struct Tables {
    global: Vec<Keyword>,
    local: HashMap<String, Vec<Keyword>>,
}

#[async_trait]
impl KeywordStore for Tables {
    async fn global_keywords(&self) -> Result<Vec<Keyword>, StoreError> {
        Ok(self.global.clone())
    }

    async fn local_keywords(&self, domain: &str) -> Result<Vec<Keyword>, StoreError> {
        Ok(self.local.get(domain).cloned().unwrap_or_default())
    }
}

#[tokio::test]
async fn test_load_uses_registrable_domain() {
    let store = Tables {
        global: vec![Keyword::new("g", "//g")],
        local: HashMap::from([("example.com".to_string(), vec![Keyword::new("l", "//l")])]),
    };

    let set = KeywordSet::load(&store, Some("https://app.example.com/x")).await.unwrap();
    assert_eq!(set.global.len(), 1);
    assert_eq!(set.local.len(), 1);

    let without_url = KeywordSet::load(&store, None).await.unwrap();
    assert!(without_url.local.is_empty());
}
