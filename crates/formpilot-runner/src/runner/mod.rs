mod execute;

pub use execute::{execute, navigate_and_detect};

use crate::config::{BrowserConfig, Condition, Config, SuccessCondition};
use crate::driver::PageDriver;
use crate::{screenshot, Error, FillRecord, Result};
use eoka::{Browser, Page};
use formpilot_detect::Detection;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of running a job.
#[derive(Debug)]
pub struct RunResult {
    pub success: bool,
    /// Last error when every attempt failed.
    pub error: Option<String>,
    /// Fill record of the last attempt that got through submission.
    pub filled: Option<FillRecord>,
    pub duration_ms: u64,
    /// Attempts beyond the first.
    pub retries: u32,
    /// Failure screenshot, when one was configured and captured.
    pub screenshot: Option<PathBuf>,
}

/// Owns a browser and runs signup jobs in its single page.
pub struct Runner {
    browser: Browser,
    page: Page,
}

impl Runner {
    pub async fn new(config: &BrowserConfig) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: config.viewport.as_ref().map(|v| v.width).unwrap_or(1280),
            viewport_height: config.viewport.as_ref().map(|v| v.height).unwrap_or(720),
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.headless, config.proxy
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;

        Ok(Self { browser, page })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Run the job with its retry and timeout settings.
    pub async fn run(&self, config: &Config) -> RunResult {
        run_job(&self.page, config).await
    }

    /// Navigate to the job's target and report what would be filled.
    pub async fn detect(&self, config: &Config) -> Result<Detection> {
        navigate_and_detect(&self.page, &config.target.url, &config.timing).await
    }

    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}

/// Run `config` against `page`: up to `on_failure.retry.attempts` whole
/// attempts, each bounded by `timing.overall_timeout_ms`. A screenshot is
/// saved once every attempt has failed.
pub async fn run_job<P: PageDriver + ?Sized>(page: &P, config: &Config) -> RunResult {
    let start = Instant::now();
    let retry = config.on_failure.as_ref().and_then(|f| f.retry.as_ref());
    let max_attempts = retry.map(|r| r.attempts).unwrap_or(1).max(1);
    let retry_delay = retry.map(|r| r.delay_ms).unwrap_or(0);

    let mut last_error = None;
    let mut last_filled = None;
    let mut retries = 0;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            retries += 1;
            info!("Retry attempt {}/{}", attempt, max_attempts);
            if retry_delay > 0 {
                tokio::time::sleep(Duration::from_millis(retry_delay)).await;
            }
        }

        match run_once(page, config).await {
            Ok((filled, true)) => {
                return RunResult {
                    success: true,
                    error: None,
                    filled: Some(filled),
                    duration_ms: start.elapsed().as_millis() as u64,
                    retries,
                    screenshot: None,
                };
            }
            Ok((filled, false)) => {
                warn!("Attempt {}: success conditions not met", attempt);
                last_filled = Some(filled);
                last_error = Some("success conditions not met".to_string());
            }
            Err(e) => {
                warn!("Attempt {} failed: {}", attempt, e);
                last_error = Some(e.to_string());
            }
        }
    }

    let screenshot = handle_failure(page, config).await;
    RunResult {
        success: false,
        error: last_error,
        filled: last_filled,
        duration_ms: start.elapsed().as_millis() as u64,
        retries,
        screenshot,
    }
}

async fn run_once<P: PageDriver + ?Sized>(page: &P, config: &Config) -> Result<(FillRecord, bool)> {
    let attempt = async {
        let filled = execute(page, &config.target.url, &config.credentials, &config.timing).await?;
        let success = check_success(page, config.success.as_ref()).await?;
        debug!("Success check: {}", success);
        Ok::<_, Error>((filled, success))
    };

    match config.timing.overall_timeout_ms {
        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), attempt)
            .await
            .map_err(|_| Error::Timeout(format!("attempt did not finish within {}ms", ms)))?,
        None => attempt.await,
    }
}

async fn handle_failure<P: PageDriver + ?Sized>(page: &P, config: &Config) -> Option<PathBuf> {
    let dir = config.on_failure.as_ref()?.screenshot.as_ref()?;
    match screenshot::capture(page, dir).await {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Failed to save failure screenshot: {}", e);
            None
        }
    }
}

async fn check_success<P: PageDriver + ?Sized>(
    page: &P,
    success: Option<&SuccessCondition>,
) -> Result<bool> {
    let Some(success) = success else {
        return Ok(true);
    };

    if let Some(ref any) = success.any {
        for cond in any {
            if check_condition(page, cond).await? {
                return Ok(true);
            }
        }
        return Ok(any.is_empty());
    }

    if let Some(ref all) = success.all {
        for cond in all {
            if !check_condition(page, cond).await? {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

async fn check_condition<P: PageDriver + ?Sized>(page: &P, condition: &Condition) -> Result<bool> {
    match condition {
        Condition::UrlContains(pattern) => Ok(page.url().await?.contains(pattern)),
        Condition::TextContains(pattern) => Ok(page.text().await?.contains(pattern)),
    }
}
