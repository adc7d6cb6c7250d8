//! Screenshot persistence.

use crate::driver::PageDriver;
use crate::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory used when the caller does not name one.
pub const DEFAULT_DIR: &str = "screenshots";

/// `screenshot-<ISO-8601 UTC with ':' and '.' replaced by '-'>.png`
pub fn file_name(at: DateTime<Utc>) -> String {
    let ts = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("screenshot-{}.png", ts)
}

/// Write `png` into `dir` (created if missing) under a timestamped name.
pub fn save(dir: impl AsRef<Path>, png: &[u8]) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name(Utc::now()));
    std::fs::write(&path, png)?;
    info!("Saved screenshot to {}", path.display());
    Ok(path)
}

/// Capture the page and [`save`] it.
pub async fn capture<P: PageDriver + ?Sized>(page: &P, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let png = page.screenshot().await?;
    save(dir, &png)
}
