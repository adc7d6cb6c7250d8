//! # formpilot-runner
//!
//! Detect the signup form on a page, fill it and submit it. Jobs can be
//! described in YAML and run with retries and a failure screenshot.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formpilot_runner::{Config, Runner};
//!
//! # #[tokio::main]
//! # async fn main() -> formpilot_runner::Result<()> {
//! let config = Config::load("signup.yaml")?;
//! let runner = Runner::new(&config.browser).await?;
//! let result = runner.run(&config).await;
//! println!("Success: {}", result.success);
//! runner.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Any [`PageDriver`] works with [`execute`]; `eoka::Page` implements it.

mod config;
mod credentials;
mod detection;
mod driver;
mod runner;
pub mod screenshot;
mod signup;

#[cfg(test)]
mod testing;

pub use config::{
    BrowserConfig, Condition, Config, OnFailure, ParamDef, Params, RetryConfig, SuccessCondition,
    TargetUrl, Timing, Viewport,
};
pub use credentials::Credentials;
pub use detection::{detect_auth_form, detect_page};
pub use driver::PageDriver;
pub use runner::{execute, navigate_and_detect, run_job, RunResult, Runner};
pub use signup::{signup, signup_with_timing, SignupRequest, SignupResponse};

pub use formpilot_detect::{AuthForm, Detection, Locator, Role, RoleMap};

/// Role -> locator actually filled or clicked by [`execute`].
pub type FillRecord = RoleMap;

/// Result type for formpilot-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during config loading or a signup run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("{role} field {selector} not ready within {timeout_ms}ms")]
    InteractionTimeout {
        role: Role,
        selector: String,
        timeout_ms: u64,
    },

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("detection error: {0}")]
    Detection(#[from] formpilot_detect::Error),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
