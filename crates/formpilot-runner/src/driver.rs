//! The page capabilities the orchestrator needs.
//!
//! `execute` talks to the browser only through [`PageDriver`], so the fill
//! protocol can be exercised against an in-memory page in tests.

use async_trait::async_trait;
use eoka::Page;

/// Page operations used by detection and fill-and-submit.
///
/// Every method maps onto one browser round trip. Waits take an explicit
/// timeout; nothing here blocks unbounded.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url`.
    async fn goto(&self, url: &str) -> eoka::Result<()>;

    /// Current `document.readyState`.
    async fn ready_state(&self) -> eoka::Result<String>;

    /// Sleep for `ms` milliseconds.
    async fn wait(&self, ms: u64);

    /// Evaluate a script that returns a JSON string.
    async fn evaluate_json(&self, js: &str) -> eoka::Result<String>;

    /// Wait until `selector` matches a visible element.
    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> eoka::Result<()>;

    async fn click(&self, selector: &str) -> eoka::Result<()>;

    /// Replace the value of the field matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> eoka::Result<()>;

    /// Wait until there has been no network activity for `idle_ms`.
    async fn wait_for_network_idle(&self, idle_ms: u64, timeout_ms: u64) -> eoka::Result<()>;

    /// PNG of the current viewport.
    async fn screenshot(&self) -> eoka::Result<Vec<u8>>;

    async fn url(&self) -> eoka::Result<String>;

    /// Visible text of the document body.
    async fn text(&self) -> eoka::Result<String>;
}

#[async_trait]
impl PageDriver for Page {
    async fn goto(&self, url: &str) -> eoka::Result<()> {
        Page::goto(self, url).await
    }

    async fn ready_state(&self) -> eoka::Result<String> {
        self.evaluate::<String>("document.readyState").await
    }

    async fn wait(&self, ms: u64) {
        Page::wait(self, ms).await;
    }

    async fn evaluate_json(&self, js: &str) -> eoka::Result<String> {
        self.evaluate::<String>(js).await
    }

    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> eoka::Result<()> {
        Page::wait_for_visible(self, selector, timeout_ms).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> eoka::Result<()> {
        Page::click(self, selector).await
    }

    async fn fill(&self, selector: &str, value: &str) -> eoka::Result<()> {
        Page::fill(self, selector, value).await
    }

    async fn wait_for_network_idle(&self, idle_ms: u64, timeout_ms: u64) -> eoka::Result<()> {
        Page::wait_for_network_idle(self, idle_ms, timeout_ms).await?;
        Ok(())
    }

    async fn screenshot(&self) -> eoka::Result<Vec<u8>> {
        Page::screenshot(self).await
    }

    async fn url(&self) -> eoka::Result<String> {
        Page::url(self).await
    }

    async fn text(&self) -> eoka::Result<String> {
        Page::text(self).await
    }
}
