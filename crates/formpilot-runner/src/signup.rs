//! One-call signup: the operation tool servers expose.

use crate::config::Timing;
use crate::credentials::Credentials;
use crate::driver::PageDriver;
use crate::{execute, FillRecord, Result};
use serde::{Deserialize, Serialize};

/// Where to sign up, and with what.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub url: String,
    #[serde(flatten)]
    pub credentials: Credentials,
}

/// Locators that were filled or clicked, per role.
#[derive(Debug, Clone, Serialize)]
pub struct SignupResponse {
    pub filled: FillRecord,
}

/// Run the fill-and-submit flow with default timing.
pub async fn signup<P: PageDriver + ?Sized>(page: &P, req: &SignupRequest) -> Result<SignupResponse> {
    signup_with_timing(page, req, &Timing::default()).await
}

pub async fn signup_with_timing<P: PageDriver + ?Sized>(
    page: &P,
    req: &SignupRequest,
    timing: &Timing,
) -> Result<SignupResponse> {
    let filled = execute(page, &req.url, &req.credentials, timing).await?;
    Ok(SignupResponse { filled })
}
