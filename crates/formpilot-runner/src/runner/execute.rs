//! The fill-and-submit protocol.

use crate::config::Timing;
use crate::credentials::Credentials;
use crate::detection::detect_page;
use crate::driver::PageDriver;
use crate::{Error, FillRecord, Result};
use formpilot_detect::{Detection, Locator, Role};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval between `document.readyState` polls.
const READY_POLL_MS: u64 = 100;

/// Navigate to `target`, wait for the document to load and settle, then
/// detect the form. Nothing is filled.
pub async fn navigate_and_detect<P: PageDriver + ?Sized>(
    page: &P,
    target: &str,
    timing: &Timing,
) -> Result<Detection> {
    info!("Navigating to: {}", target);
    page.goto(target).await.map_err(|e| Error::Navigation {
        url: target.to_string(),
        message: e.to_string(),
    })?;

    wait_for_load(page, timing.load_timeout_ms).await;
    page.wait(timing.settle_ms).await;

    detect_page(page).await
}

/// Detect the signup form at `target`, fill every detected field, submit,
/// and let the page settle.
///
/// Absent roles are skipped. A field whose locator was already filled in
/// this call (the confirm-password fallback landing on the password input)
/// is not filled twice and is left out of the returned record. No retries.
pub async fn execute<P: PageDriver + ?Sized>(
    page: &P,
    target: &str,
    credentials: &Credentials,
    timing: &Timing,
) -> Result<FillRecord> {
    let detection = navigate_and_detect(page, target, timing).await?;

    let mut record = FillRecord::default();
    for (role, locator) in detection.fields() {
        if let Some((prev, _)) = record.iter().find(|(_, used)| *used == locator) {
            info!("{} resolves to the {} field ({}), not filling it twice", role, prev, locator);
            continue;
        }
        let Some(value) = credentials.value_for(role) else {
            continue;
        };
        fill_field(page, role, locator, value, timing).await?;
        record.set(role, Some(locator.clone()));
    }

    match &detection.submit {
        Some(submit) => {
            info!("Submitting via {}", submit);
            page.click(submit.as_str()).await?;
            record.set(Role::Submit, Some(submit.clone()));
        }
        None => warn!("No submit control detected, form left unsubmitted"),
    }

    settle_after_submit(page, timing).await;
    info!("Filled {} roles", record.len());
    Ok(record)
}

/// Poll until the document is no longer `loading`. Gives up silently after
/// `timeout_ms`; slow subresources are not a reason to abort.
async fn wait_for_load<P: PageDriver + ?Sized>(page: &P, timeout_ms: u64) {
    let poll = async {
        loop {
            match page.ready_state().await {
                Ok(state) if state != "loading" => return,
                Ok(_) => {}
                Err(e) => debug!("readyState unavailable: {}", e),
            }
            page.wait(READY_POLL_MS).await;
        }
    };
    if tokio::time::timeout(Duration::from_millis(timeout_ms), poll)
        .await
        .is_err()
    {
        warn!("Document still loading after {}ms, continuing", timeout_ms);
    }
}

/// Wait for visibility, focus-click (failures ignored), then fill.
async fn fill_field<P: PageDriver + ?Sized>(
    page: &P,
    role: Role,
    locator: &Locator,
    value: &str,
    timing: &Timing,
) -> Result<()> {
    let selector = locator.as_str();
    let limit = Duration::from_millis(timing.field_timeout_ms);
    let timed_out = || Error::InteractionTimeout {
        role,
        selector: selector.to_string(),
        timeout_ms: timing.field_timeout_ms,
    };

    debug!("Waiting for {} field {}", role, selector);
    match tokio::time::timeout(limit, page.wait_for_visible(selector, timing.field_timeout_ms)).await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!("{} never became visible: {}", selector, e);
            return Err(timed_out());
        }
        Err(_) => return Err(timed_out()),
    }

    let focus = Duration::from_millis(timing.focus_timeout_ms);
    match tokio::time::timeout(focus, page.click(selector)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Focus click on {} failed: {}", selector, e),
        Err(_) => debug!("Focus click on {} timed out", selector),
    }

    match tokio::time::timeout(limit, page.fill(selector, value)).await {
        Ok(res) => {
            res?;
            debug!("Filled {} ({})", role, selector);
            Ok(())
        }
        Err(_) => Err(timed_out()),
    }
}

/// Network idle or the post-submit bound, whichever comes first.
async fn settle_after_submit<P: PageDriver + ?Sized>(page: &P, timing: &Timing) {
    tokio::select! {
        res = page.wait_for_network_idle(timing.network_idle_ms, timing.post_submit_timeout_ms) => {
            if let Err(e) = res {
                debug!("Network idle wait ended with error: {}", e);
            }
        }
        _ = tokio::time::sleep(Duration::from_millis(timing.post_submit_timeout_ms)) => {
            debug!("Network still busy after {}ms", timing.post_submit_timeout_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPage;
    use formpilot_detect::{ElementInfo, Snapshot};

    fn fast() -> Timing {
        Timing {
            settle_ms: 0,
            load_timeout_ms: 200,
            field_timeout_ms: 100,
            focus_timeout_ms: 50,
            post_submit_timeout_ms: 100,
            network_idle_ms: 10,
            overall_timeout_ms: None,
        }
    }

    fn creds() -> Credentials {
        Credentials {
            firstname: "Ada".into(),
            lastname: "Lovelace".into(),
            email: "ada@example.com".into(),
            password: "Engine#1843".into(),
            confirm_password: Some("Engine#1843".into()),
        }
    }

    /// first_name, last_name, email, two passwords, "Create Account" div.
    fn full_form() -> Snapshot {
        Snapshot::new(vec![
            ElementInfo::new("input").with_name("first_name"),
            ElementInfo::new("input").with_name("last_name"),
            ElementInfo::new("input").with_type("email").with_name("email"),
            ElementInfo::new("input").with_type("password").with_name("password"),
            ElementInfo::new("input").with_type("password").with_name("password_confirm"),
            ElementInfo::new("div").with_text("Create Account").with_nth_of_type(2),
        ])
    }

    const TARGET: &str = "https://example.com/signup";

    #[tokio::test]
    async fn fills_full_form_in_order_and_submits() {
        let page = MockPage::new(full_form());
        let record = execute(&page, TARGET, &creds(), &fast()).await.unwrap();

        assert_eq!(record.firstname.as_ref().unwrap().as_str(), r#"input[name*="first" i]"#);
        assert_eq!(record.lastname.as_ref().unwrap().as_str(), r#"input[name*="last" i]"#);
        assert_eq!(record.email.as_ref().unwrap().as_str(), r#"input[type="email"]"#);
        assert_eq!(record.password.as_ref().unwrap().as_str(), r#"input[type="password"]"#);
        assert_eq!(
            record.confirm_password.as_ref().unwrap().as_str(),
            r#"input[name*="confirm" i]"#
        );
        assert_eq!(record.submit.as_ref().unwrap().as_str(), "div:nth-of-type(2)");

        assert_eq!(
            page.calls_to("fill"),
            vec![
                r#"fill input[name*="first" i] = Ada"#,
                r#"fill input[name*="last" i] = Lovelace"#,
                r#"fill input[type="email"] = ada@example.com"#,
                r#"fill input[type="password"] = Engine#1843"#,
                r#"fill input[name*="confirm" i] = Engine#1843"#,
            ]
        );
        let calls = page.calls();
        assert_eq!(calls[0], format!("goto {}", TARGET));
        assert_eq!(calls[1], "snapshot");
        let submit_at = calls.iter().position(|c| c == "click div:nth-of-type(2)").unwrap();
        let last_fill = calls.iter().rposition(|c| c.starts_with("fill")).unwrap();
        assert!(submit_at > last_fill);
        assert_eq!(calls.last().unwrap(), "network_idle");
    }

    #[tokio::test]
    async fn partial_form_fills_what_exists() {
        let page = MockPage::new(Snapshot::new(vec![
            ElementInfo::new("input").with_type("email"),
            ElementInfo::new("input").with_type("password"),
        ]));
        let record = execute(&page, TARGET, &creds(), &fast()).await.unwrap();

        assert!(record.firstname.is_none());
        assert!(record.lastname.is_none());
        assert!(record.submit.is_none());
        assert!(record.email.is_some());
        assert!(record.password.is_some());
        // The confirm fallback lands on the password input and is not refilled.
        assert!(record.confirm_password.is_none());
        assert_eq!(page.calls_to("fill").len(), 2);
        assert!(page.calls_to("click").iter().all(|c| !c.contains("submit")));
    }

    #[tokio::test]
    async fn email_password_form_with_submit_button() {
        let page = MockPage::new(Snapshot::new(vec![
            ElementInfo::new("input").with_type("email"),
            ElementInfo::new("input").with_type("password"),
            ElementInfo::new("button").with_type("submit").with_text("Create Account"),
        ]));
        let creds = Credentials {
            firstname: "Arpan".into(),
            lastname: "Sarkar".into(),
            email: "a@example.com".into(),
            password: "p1".into(),
            confirm_password: Some("p1".into()),
        };
        let record = execute(&page, TARGET, &creds, &fast()).await.unwrap();

        assert_eq!(
            page.calls_to("fill"),
            vec![
                r#"fill input[type="email"] = a@example.com"#,
                r#"fill input[type="password"] = p1"#,
            ]
        );
        let calls = page.calls();
        let submit_at = calls
            .iter()
            .position(|c| c == r#"click button[type="submit"]"#)
            .unwrap();
        let last_fill = calls.iter().rposition(|c| c.starts_with("fill")).unwrap();
        assert!(submit_at > last_fill);

        assert_eq!(record.email.as_ref().unwrap().as_str(), r#"input[type="email"]"#);
        assert_eq!(record.password.as_ref().unwrap().as_str(), r#"input[type="password"]"#);
        assert_eq!(record.submit.as_ref().unwrap().as_str(), r#"button[type="submit"]"#);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["firstname"].is_null());
        assert!(json["lastname"].is_null());
        assert!(json["confirm_password"].is_null());
    }

    #[tokio::test]
    async fn removed_field_is_an_interaction_timeout() {
        let mut page = MockPage::new(full_form());
        page.removed.insert(r#"input[type="email"]"#.into());

        let err = execute(&page, TARGET, &creds(), &fast()).await.unwrap_err();
        match err {
            Error::InteractionTimeout {
                role,
                selector,
                timeout_ms,
            } => {
                assert_eq!(role, Role::Email);
                assert_eq!(selector, r#"input[type="email"]"#);
                assert_eq!(timeout_ms, 100);
            }
            other => panic!("expected InteractionTimeout, got {other:?}"),
        }
        // Earlier fields were filled; nothing after the failure, no submit.
        assert_eq!(page.calls_to("fill").len(), 2);
        assert!(!page.calls().iter().any(|c| c == "click div:nth-of-type(2)"));
    }

    #[tokio::test]
    async fn navigation_failure_stops_everything() {
        let mut page = MockPage::new(full_form());
        page.fail_goto = true;

        let err = execute(&page, TARGET, &creds(), &fast()).await.unwrap_err();
        match err {
            Error::Navigation { url, message } => {
                assert_eq!(url, TARGET);
                assert!(message.contains("ERR_NAME_NOT_RESOLVED"));
            }
            other => panic!("expected Navigation, got {other:?}"),
        }
        assert_eq!(page.calls(), vec![format!("goto {}", TARGET)]);
    }

    #[tokio::test]
    async fn focus_click_failures_are_swallowed() {
        let mut page = MockPage::new(full_form());
        page.failing_clicks.insert(r#"input[name*="first" i]"#.into());
        page.hanging_clicks.insert(r#"input[type="email"]"#.into());

        let record = execute(&page, TARGET, &creds(), &fast()).await.unwrap();
        assert!(record.firstname.is_some());
        assert!(record.email.is_some());
        assert_eq!(page.calls_to("fill").len(), 5);
    }

    #[tokio::test]
    async fn hanging_fill_times_out() {
        let mut page = MockPage::new(full_form());
        page.hanging_fills.insert(r#"input[type="password"]"#.into());

        let err = execute(&page, TARGET, &creds(), &fast()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InteractionTimeout {
                role: Role::Password,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn failing_submit_click_propagates() {
        let mut page = MockPage::new(full_form());
        page.failing_clicks.insert("div:nth-of-type(2)".into());

        let err = execute(&page, TARGET, &creds(), &fast()).await.unwrap_err();
        assert!(matches!(err, Error::Browser(_)));
    }

    #[tokio::test]
    async fn busy_network_does_not_block_completion() {
        let mut page = MockPage::new(full_form());
        page.never_idle = true;

        let started = std::time::Instant::now();
        let record = execute(&page, TARGET, &creds(), &fast()).await.unwrap();
        assert!(record.submit.is_some());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn stuck_loading_state_proceeds_after_bound() {
        let mut page = MockPage::new(full_form());
        page.ready_state = Some("loading".into());

        let record = execute(&page, TARGET, &creds(), &fast()).await.unwrap();
        assert_eq!(record.len(), 6);
    }

    #[tokio::test]
    async fn empty_page_is_not_an_error() {
        let page = MockPage::new(Snapshot::default());
        let record = execute(&page, TARGET, &creds(), &fast()).await.unwrap();
        assert!(record.is_empty());
        assert_eq!(page.calls().last().unwrap(), "network_idle");
    }
}
