//! Scripted in-memory page for exercising the fill protocol without Chrome.

use crate::driver::PageDriver;
use async_trait::async_trait;
use formpilot_detect::Snapshot;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct MockPage {
    pub snapshot: Snapshot,
    /// Value of `document.readyState` for every poll.
    pub ready_state: Option<String>,
    pub fail_goto: bool,
    /// Selectors that never become visible.
    pub removed: HashSet<String>,
    /// Selectors whose click fails.
    pub failing_clicks: HashSet<String>,
    /// Selectors whose click never completes.
    pub hanging_clicks: HashSet<String>,
    /// Selectors whose fill never completes.
    pub hanging_fills: HashSet<String>,
    pub never_idle: bool,
    pub url: String,
    pub text: String,
    pub calls: Mutex<Vec<String>>,
}

impl MockPage {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            url: "https://example.com/welcome".into(),
            ..Default::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls starting with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn goto(&self, url: &str) -> eoka::Result<()> {
        self.record(format!("goto {}", url));
        if self.fail_goto {
            return Err(eoka::Error::CdpSimple("net::ERR_NAME_NOT_RESOLVED".into()));
        }
        Ok(())
    }

    async fn ready_state(&self) -> eoka::Result<String> {
        Ok(self.ready_state.clone().unwrap_or_else(|| "complete".into()))
    }

    async fn wait(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn evaluate_json(&self, _js: &str) -> eoka::Result<String> {
        self.record("snapshot".into());
        Ok(serde_json::to_string(&self.snapshot).unwrap())
    }

    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> eoka::Result<()> {
        if self.removed.contains(selector) {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            return Err(eoka::Error::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> eoka::Result<()> {
        self.record(format!("click {}", selector));
        if self.hanging_clicks.contains(selector) {
            std::future::pending::<()>().await;
        }
        if self.failing_clicks.contains(selector) {
            return Err(eoka::Error::CdpSimple("element is not clickable".into()));
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> eoka::Result<()> {
        self.record(format!("fill {} = {}", selector, value));
        if self.hanging_fills.contains(selector) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn wait_for_network_idle(&self, _idle_ms: u64, _timeout_ms: u64) -> eoka::Result<()> {
        self.record("network_idle".into());
        if self.never_idle {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn screenshot(&self) -> eoka::Result<Vec<u8>> {
        self.record("screenshot".into());
        Ok(b"\x89PNG\r\n".to_vec())
    }

    async fn url(&self) -> eoka::Result<String> {
        Ok(self.url.clone())
    }

    async fn text(&self) -> eoka::Result<String> {
        Ok(self.text.clone())
    }
}
