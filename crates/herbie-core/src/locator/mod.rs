//! Element locator.
//!
//! Maps a human description ("Submit", "firstname", `#result`,
//! `//button[1]`) to an element. Not finding an element is an expected
//! outcome, so every lookup returns `Option` and page errors are logged and
//! treated as a miss.

mod heading;

pub use heading::xpath_literal;

use std::time::Duration;

use herbie_config::LocatorConfig;
use herbie_protocols::command::unquote;
use herbie_protocols::{ElementRef, Page, PageError};
use tracing::debug;

const FORM_CONTROLS: &str = ".//input | .//select | .//textarea";

/// Heuristic element lookup with fixed-delay retries.
#[derive(Clone, Copy)]
pub struct Locator<'a> {
    page: &'a dyn Page,
    retries: u32,
    delay: Duration,
}

impl<'a> Locator<'a> {
    pub fn new(page: &'a dyn Page, retries: u32, delay: Duration) -> Self {
        Self {
            page,
            retries,
            delay,
        }
    }

    pub fn from_config(page: &'a dyn Page, config: &LocatorConfig) -> Self {
        Self::new(page, config.retries, Duration::from_millis(config.retry_delay_ms))
    }

    /// Same page, a single attempt and no sleeping.
    pub fn single_attempt(&self) -> Self {
        Self::new(self.page, 0, Duration::ZERO)
    }

    pub fn page(&self) -> &'a dyn Page {
        self.page
    }

    /// Find an element, retrying up to `retries` times with `delay` after
    /// each miss. With zero retries a single attempt is made.
    pub async fn find_element(&self, descriptor: &str) -> Option<ElementRef> {
        let desc = unquote(descriptor.trim()).trim();
        let attempts = self.retries.max(1);

        for attempt in 1..=attempts {
            match self.attempt(desc).await {
                Ok(Some(el)) => {
                    debug!(descriptor = %desc, attempt, "Found element");
                    return Some(el);
                }
                Ok(None) => {}
                Err(e) => debug!(descriptor = %desc, attempt, error = %e, "Lookup failed"),
            }
            if self.retries > 0 {
                tokio::time::sleep(self.delay).await;
            }
        }

        debug!(descriptor = %desc, attempts, "Element not found");
        None
    }

    async fn attempt(&self, desc: &str) -> Result<Option<ElementRef>, PageError> {
        if desc.starts_with("//") {
            if let Some(el) = self.page.evaluate_xpath(desc, None).await?.into_iter().next() {
                return Ok(Some(el));
            }
        }

        match self.page.query_selector(desc).await {
            Ok(Some(el)) => return Ok(Some(el)),
            Ok(None) => {}
            Err(e) => debug!(descriptor = %desc, error = %e, "Not a usable selector"),
        }

        for label in self.page.query_selector_all("label").await? {
            if !self.page.text_content(label).await?.trim().contains(desc) {
                continue;
            }
            match self.page.attribute(label, "for").await?.filter(|f| !f.is_empty()) {
                Some(id) => {
                    if let Some(el) = self.page.element_by_id(&id).await? {
                        return Ok(Some(el));
                    }
                }
                None => return Ok(Some(label)),
            }
            break;
        }

        self.first_with_text(desc, false).await
    }

    /// First `<button>` or `<a>` whose trimmed text contains `needle`.
    async fn first_with_text(
        &self,
        needle: &str,
        ignore_case: bool,
    ) -> Result<Option<ElementRef>, PageError> {
        for el in self.page.query_selector_all("button, a").await? {
            let text = self.page.text_content(el).await?;
            let text = text.trim();
            let hit = if ignore_case {
                text.to_lowercase().contains(needle)
            } else {
                text.contains(needle)
            };
            if hit {
                return Ok(Some(el));
            }
        }
        Ok(None)
    }

    /// Case-insensitive label, button and link matching, with the raw
    /// descriptor as a unique CSS selector as a last resort.
    pub async fn find_desc(&self, descriptor: &str) -> Option<ElementRef> {
        match self.desc_attempt(unquote(descriptor.trim()).trim()).await {
            Ok(found) => found,
            Err(e) => {
                debug!(descriptor, error = %e, "Description lookup failed");
                None
            }
        }
    }

    async fn desc_attempt(&self, raw: &str) -> Result<Option<ElementRef>, PageError> {
        let lower = raw.to_lowercase();
        let bare = lower.trim_end_matches(':');
        let with_colon = format!("{bare}:");

        for needle in [with_colon.as_str(), bare] {
            if let Some(el) = self.label_target(needle).await? {
                return Ok(Some(el));
            }
        }

        if let Some(el) = self.first_with_text(bare, true).await? {
            return Ok(Some(el));
        }

        match self.page.query_selector_all(raw).await {
            Ok(found) if found.len() == 1 => Ok(found.into_iter().next()),
            _ => Ok(None),
        }
    }

    /// Control labelled by a label containing `needle`, case-insensitively.
    async fn label_target(&self, needle: &str) -> Result<Option<ElementRef>, PageError> {
        for label in self.page.query_selector_all("label").await? {
            let text = self.page.text_content(label).await?;
            if !text.trim().to_lowercase().contains(needle) {
                continue;
            }
            if let Some(id) = self.page.attribute(label, "for").await?.filter(|f| !f.is_empty()) {
                if let Some(el) = self.page.element_by_id(&id).await? {
                    return Ok(Some(el));
                }
            }
            let nested = self.page.evaluate_xpath(FORM_CONTROLS, Some(label)).await?;
            if let Some(el) = nested.into_iter().next() {
                return Ok(Some(el));
            }
        }
        Ok(None)
    }

    /// Find `target` inside the section introduced by `heading`.
    pub async fn find_through_heading(
        &self,
        heading: &str,
        target: &str,
        depth: usize,
    ) -> Option<ElementRef> {
        match heading::find(self.page, heading, target, depth).await {
            Ok(found) => found,
            Err(e) => {
                debug!(heading, target, error = %e, "Heading lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "locator_tests.rs"]
mod tests;
