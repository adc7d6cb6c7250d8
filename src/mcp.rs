use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use eoka::{Browser, Page, StealthConfig};
use formpilot_runner::{screenshot, Credentials, PageDriver, SignupRequest};
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// Used when a tool call does not give its own timeout.
const DEFAULT_WAIT_MS: u64 = 30_000;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OpenUrlRequest {
    #[schemars(description = "URL to open")]
    pub url: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SelectorRequest {
    #[schemars(description = "CSS selector")]
    pub selector: String,
    #[schemars(description = "How long to wait for the element to become visible, in ms (default 30000)")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SendKeysRequest {
    #[schemars(description = "CSS selector of the input")]
    pub selector: String,
    #[schemars(description = "Text that replaces the input's value")]
    pub text: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SignupToolRequest {
    #[schemars(description = "Signup page URL")]
    pub url: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
    #[schemars(description = "Defaults to password")]
    pub confirm_password: Option<String>,
}

impl From<SignupToolRequest> for SignupRequest {
    fn from(req: SignupToolRequest) -> Self {
        SignupRequest {
            url: req.url,
            credentials: Credentials {
                firstname: req.firstname,
                lastname: req.lastname,
                email: req.email,
                password: req.password,
                confirm_password: req.confirm_password,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Browser state
// ---------------------------------------------------------------------------

struct BrowserState {
    browser: Browser,
    page: Page,
    /// Set on a transport error; the browser is relaunched on the next call.
    unhealthy: bool,
}

impl BrowserState {
    async fn launch(headless: bool) -> eoka::Result<Self> {
        let patch_binary = std::env::var("FORMPILOT_PATCH_BINARY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let config = StealthConfig {
            headless,
            patch_binary,
            ..Default::default()
        };
        info!("launching browser (headless={})", headless);
        let browser = Browser::launch_with_config(config).await?;
        let page = browser.new_page("about:blank").await?;
        Ok(Self {
            browser,
            page,
            unhealthy: false,
        })
    }

    async fn close(self) -> eoka::Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

fn err(e: impl std::fmt::Display) -> ErrorData {
    ErrorData::internal_error(e.to_string(), None::<Value>)
}

/// Whether an error means the CDP connection is gone.
fn is_transport_error(e: &impl std::fmt::Display) -> bool {
    let msg = e.to_string().to_lowercase();
    msg.contains("websocket")
        || msg.contains("transport")
        || msg.contains("connection")
        || msg.contains("broken pipe")
        || msg.contains("reset by peer")
}

/// Map a tool failure, marking the browser for relaunch on transport errors.
fn fail(state: &mut Option<BrowserState>, e: impl std::fmt::Display) -> ErrorData {
    if !is_transport_error(&e) {
        return err(e);
    }
    warn!("connection lost, marking browser unhealthy: {}", e);
    if let Some(state) = state.as_mut() {
        state.unhealthy = true;
    }
    ErrorData::internal_error(
        format!("{} (connection lost - will relaunch on next call)", e),
        None::<Value>,
    )
}

fn page_of(state: &Option<BrowserState>) -> Result<&Page, ErrorData> {
    state
        .as_ref()
        .map(|s| &s.page)
        .ok_or_else(|| err("browser is not running"))
}

fn text_ok(s: impl Into<String>) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::text(s.into())]))
}

fn json_ok(value: &impl serde::Serialize) -> Result<CallToolResult, ErrorData> {
    text_ok(serde_json::to_string_pretty(value).map_err(err)?)
}

#[derive(Clone)]
pub struct FormpilotServer {
    state: Arc<Mutex<Option<BrowserState>>>,
    tool_router: ToolRouter<Self>,
    headless: bool,
}

impl FormpilotServer {
    /// Lock the browser, launching or relaunching it as needed. The page is
    /// held exclusively for as long as the guard lives.
    async fn browser(&self) -> Result<MutexGuard<'_, Option<BrowserState>>, ErrorData> {
        let mut guard = self.state.lock().await;
        if guard.as_ref().is_some_and(|s| s.unhealthy) {
            warn!("browser unhealthy, relaunching");
            if let Some(state) = guard.take() {
                let _ = state.close().await;
            }
        }
        if guard.is_none() {
            *guard = Some(BrowserState::launch(self.headless).await.map_err(err)?);
        }
        Ok(guard)
    }
}

#[tool_router]
impl FormpilotServer {
    pub fn new() -> Self {
        let headless = std::env::var("FORMPILOT_HEADLESS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            state: Arc::new(Mutex::new(None)),
            tool_router: Self::tool_router(),
            headless,
        }
    }

    #[tool(description = "Open a URL in the browser. Launches the browser on first call.")]
    async fn open_url(&self, req: Parameters<OpenUrlRequest>) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.browser().await?;
        let res = page_of(&guard)?.goto(&req.0.url).await;
        res.map_err(|e| fail(&mut guard, e))?;
        let title = page_of(&guard)?.title().await.unwrap_or_default();
        text_ok(format!("Opened: {}\nTitle: {}", req.0.url, title))
    }

    #[tool(description = "Wait for an element matching a CSS selector to be visible, then click it.")]
    async fn click_selector(
        &self,
        req: Parameters<SelectorRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.browser().await?;
        let page = page_of(&guard)?;
        let timeout = req.0.timeout_ms.unwrap_or(DEFAULT_WAIT_MS);
        let res = match PageDriver::wait_for_visible(page, &req.0.selector, timeout).await {
            Ok(()) => PageDriver::click(page, &req.0.selector).await,
            Err(e) => Err(e),
        };
        res.map_err(|e| fail(&mut guard, e))?;
        text_ok(format!("Clicked {}", req.0.selector))
    }

    #[tool(description = "Replace the value of the input matching a CSS selector.")]
    async fn send_keys(&self, req: Parameters<SendKeysRequest>) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.browser().await?;
        let res = PageDriver::fill(page_of(&guard)?, &req.0.selector, &req.0.text).await;
        res.map_err(|e| fail(&mut guard, e))?;
        text_ok(format!("Filled {}", req.0.selector))
    }

    #[tool(description = "Wait until an element matching a CSS selector is visible.")]
    async fn wait_for_selector(
        &self,
        req: Parameters<SelectorRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.browser().await?;
        let timeout = req.0.timeout_ms.unwrap_or(DEFAULT_WAIT_MS);
        let res = PageDriver::wait_for_visible(page_of(&guard)?, &req.0.selector, timeout).await;
        res.map_err(|e| fail(&mut guard, e))?;
        text_ok(format!("Visible: {}", req.0.selector))
    }

    #[tool(
        description = "Save a screenshot under screenshots/ and return it. Text result is 'saved:<path>'."
    )]
    async fn take_screenshot(&self) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.browser().await?;
        let res = PageDriver::screenshot(page_of(&guard)?).await;
        let png = res.map_err(|e| fail(&mut guard, e))?;
        let path = screenshot::save(screenshot::DEFAULT_DIR, &png).map_err(err)?;
        Ok(CallToolResult::success(vec![
            Content::text(format!("saved:{}", path.display())),
            Content::image(BASE64.encode(&png), "image/png"),
        ]))
    }

    #[tool(
        description = "Detect the login/signup form on the current page. Returns {emailSelector, passwordSelector, submitSelector}; missing ones are null."
    )]
    async fn find_auth_form(&self) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.browser().await?;
        let res = formpilot_runner::detect_auth_form(page_of(&guard)?).await;
        let form = res.map_err(|e| fail(&mut guard, e))?;
        json_ok(&form)
    }

    #[tool(
        description = "Open a signup page, detect its fields, fill firstname/lastname/email/password/confirm_password, and submit. Returns {filled: {role: selector|null}}."
    )]
    async fn signup(&self, req: Parameters<SignupToolRequest>) -> Result<CallToolResult, ErrorData> {
        let request = SignupRequest::from(req.0);
        let mut guard = self.browser().await?;
        let res = formpilot_runner::signup(page_of(&guard)?, &request).await;
        let resp = res.map_err(|e| fail(&mut guard, e))?;
        json_ok(&resp)
    }

    #[tool(description = "Close the browser and release resources.")]
    async fn close(&self) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.take() {
            state.close().await.map_err(err)?;
        }
        text_ok("Browser closed.")
    }
}

#[tool_handler]
impl ServerHandler for FormpilotServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "formpilot".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Signup form automation. Use 'signup' with url and credentials to detect, fill and \
                 submit a registration form in one call. 'find_auth_form' reports the email, \
                 password and submit selectors on the current page. For manual steps use \
                 open_url, click_selector, send_keys and wait_for_selector with CSS selectors, \
                 and take_screenshot sparingly."
                    .into(),
            ),
        }
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    use rmcp::ServiceExt;

    let server = FormpilotServer::new();
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
