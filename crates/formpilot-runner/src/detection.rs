//! Detection against a live page.

use crate::driver::PageDriver;
use crate::Result;
use formpilot_detect::{detect, snapshot_script, AuthForm, Detection, Snapshot};
use tracing::{debug, info, warn};

/// Snapshot the current document in one evaluation and resolve every role.
/// Read-only: the page is not touched.
pub async fn detect_page<P: PageDriver + ?Sized>(page: &P) -> Result<Detection> {
    let json = page.evaluate_json(&snapshot_script()).await?;
    let dom = Snapshot::from_json(&json)?;
    debug!("snapshot: {} candidate elements", dom.len());
    let detection = detect(&dom);
    log_detection(&detection);
    Ok(detection)
}

/// Email, password and submit locators on the current page.
pub async fn detect_auth_form<P: PageDriver + ?Sized>(page: &P) -> Result<AuthForm> {
    Ok(detect_page(page).await?.auth_form())
}

fn log_detection(detection: &Detection) {
    match serde_json::to_string(detection) {
        Ok(json) => info!("Detected selectors: {}", json),
        Err(e) => debug!("detection not serializable: {}", e),
    }
    for (role, locator) in detection.iter() {
        if locator.is_positional() {
            warn!("{} locator {} is positional and may break if the page reorders", role, locator);
        }
    }
    for (a, b) in detection.aliased() {
        debug!("{} and {} resolve to the same element", a, b);
    }
}
