//! DOM snapshot taken inside the page in a single evaluation.
//!
//! The page is never read element-by-element from outside: one script scans
//! the candidate elements, computes visibility in place and returns a JSON
//! payload that the resolver works on.

use serde::{Deserialize, Serialize};

use crate::rules::{Attr, CandidateRule, SUBMIT_SCAN};
use crate::Result;

/// One element as seen by the snapshot script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Lower-case tag name.
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    /// `#` + `CSS.escape(id)`, computed in the page.
    #[serde(default)]
    pub id_selector: Option<String>,
    #[serde(rename = "type", default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub autocomplete: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Inner text, or `value` for input buttons.
    #[serde(default)]
    pub text: String,
    /// Result of the visibility predicate at snapshot time.
    pub visible: bool,
    /// 1-based position among same-tag siblings.
    #[serde(default = "default_nth")]
    pub nth_of_type: usize,
    #[serde(default = "default_has_parent")]
    pub has_parent: bool,
}

fn default_nth() -> usize {
    1
}

fn default_has_parent() -> bool {
    true
}

impl ElementInfo {
    /// A visible element with the given tag and no attributes.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            visible: true,
            nth_of_type: 1,
            has_parent: true,
            ..Default::default()
        }
    }

    /// Sets `id` and an unescaped `#id` selector; only for ids that are
    /// already valid CSS identifiers.
    pub fn with_id(mut self, v: impl Into<String>) -> Self {
        let id = v.into();
        self.id_selector = Some(format!("#{}", id));
        self.id = Some(id);
        self
    }

    pub fn with_id_selector(mut self, v: impl Into<String>) -> Self {
        self.id_selector = Some(v.into());
        self
    }

    pub fn with_type(mut self, v: impl Into<String>) -> Self {
        self.input_type = Some(v.into());
        self
    }

    pub fn with_name(mut self, v: impl Into<String>) -> Self {
        self.name = Some(v.into());
        self
    }

    pub fn with_placeholder(mut self, v: impl Into<String>) -> Self {
        self.placeholder = Some(v.into());
        self
    }

    pub fn with_autocomplete(mut self, v: impl Into<String>) -> Self {
        self.autocomplete = Some(v.into());
        self
    }

    pub fn with_role(mut self, v: impl Into<String>) -> Self {
        self.role = Some(v.into());
        self
    }

    pub fn with_text(mut self, v: impl Into<String>) -> Self {
        self.text = v.into();
        self
    }

    pub fn with_nth_of_type(mut self, nth: usize) -> Self {
        self.nth_of_type = nth;
        self
    }

    /// Mark as failing the visibility predicate.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark as having no parent element.
    pub fn detached(mut self) -> Self {
        self.has_parent = false;
        self
    }

    /// Value of an attribute the rules inspect.
    pub fn attr(&self, attr: Attr) -> Option<&str> {
        match attr {
            Attr::Type => self.input_type.as_deref(),
            Attr::Name => self.name.as_deref(),
            Attr::Placeholder => self.placeholder.as_deref(),
            Attr::Autocomplete => self.autocomplete.as_deref(),
            Attr::Role => self.role.as_deref(),
        }
    }
}

/// Document-ordered view of the candidate elements on a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub elements: Vec<ElementInfo>,
}

impl Snapshot {
    pub fn new(elements: Vec<ElementInfo>) -> Self {
        Self { elements }
    }

    /// Parse the JSON string returned by [`snapshot_script`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// First element in document order matching `rule`, visible or not.
    pub fn query_first(&self, rule: &CandidateRule) -> Option<&ElementInfo> {
        self.elements.iter().find(|el| rule.matches(el))
    }

    /// All elements matching `rule`, in document order.
    pub fn query_all<'a>(
        &'a self,
        rule: &'a CandidateRule,
    ) -> impl Iterator<Item = &'a ElementInfo> + 'a {
        self.elements.iter().filter(move |el| rule.matches(el))
    }

    pub fn is_visible(&self, el: &ElementInfo) -> bool {
        el.visible
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Snapshot script. Called with the scan selector; returns a JSON string.
const SNAPSHOT_JS: &str = r#"
((scan) => {
    const visible = (el) => {
        if (typeof el.checkVisibility === 'function') {
            return el.checkVisibility({ checkOpacity: true, checkVisibilityCSS: true });
        }
        if (el.offsetParent === null && getComputedStyle(el).position !== 'fixed') return false;
        for (let n = el; n && n.nodeType === 1; n = n.parentElement) {
            const s = getComputedStyle(n);
            if (s.display === 'none' || s.visibility === 'hidden' || parseFloat(s.opacity) === 0) return false;
        }
        return true;
    };

    const nthOfType = (el) => {
        const p = el.parentElement;
        if (!p) return 1;
        return Array.from(p.children).filter(c => c.tagName === el.tagName).indexOf(el) + 1;
    };

    const elements = [];
    for (const el of document.querySelectorAll(scan)) {
        const tag = el.tagName.toLowerCase();
        const role = el.getAttribute('role');
        const text = ((tag === 'input' ? el.value : el.innerText) || el.value || '').trim();
        const vis = visible(el);

        // Hidden or empty containers can never be a submit candidate.
        if ((tag === 'a' || tag === 'div' || tag === 'span') && role !== 'button') {
            if (!vis || !text) continue;
        }

        elements.push({
            tag,
            id: el.id || null,
            id_selector: el.id ? '#' + CSS.escape(el.id) : null,
            type: el.getAttribute('type'),
            name: el.getAttribute('name'),
            placeholder: el.getAttribute('placeholder'),
            autocomplete: el.getAttribute('autocomplete'),
            role,
            text,
            visible: vis,
            nth_of_type: nthOfType(el),
            has_parent: !!el.parentElement,
        });
    }
    return JSON.stringify({ elements });
})
"#;

/// Selector covering every element the resolver may look at: all inputs
/// plus the tier-2 submit categories.
pub fn scan_selector() -> String {
    let mut parts = vec!["input".to_string()];
    for rule in SUBMIT_SCAN {
        let sel = rule.selector();
        if !parts.contains(&sel) {
            parts.push(sel);
        }
    }
    parts.join(", ")
}

/// Full expression to evaluate in the page. Pure: reads the DOM, writes nothing.
pub fn snapshot_script() -> String {
    format!(
        "{}({})",
        SNAPSHOT_JS,
        serde_json::to_string(&scan_selector()).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_payload() {
        let json = r##"{"elements":[
            {"tag":"input","id":null,"type":"email","name":"user_email","placeholder":null,
             "autocomplete":"email","role":null,"text":"","visible":true,"nth_of_type":2,"has_parent":true},
            {"tag":"button","id":"1go","id_selector":"#\\31 go","type":null,"name":null,"placeholder":null,
             "autocomplete":null,"role":null,"text":"Sign up","visible":false,"nth_of_type":1,"has_parent":true}
        ]}"##;
        let snap = Snapshot::from_json(json).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.elements[0].input_type.as_deref(), Some("email"));
        assert_eq!(snap.elements[0].nth_of_type, 2);
        assert_eq!(snap.elements[1].id.as_deref(), Some("1go"));
        assert_eq!(snap.elements[1].id_selector.as_deref(), Some(r"#\31 go"));
        assert!(!snap.elements[1].visible);
    }

    #[test]
    fn parse_fills_defaults() {
        let snap = Snapshot::from_json(r#"{"elements":[{"tag":"span","visible":true}]}"#).unwrap();
        let el = &snap.elements[0];
        assert_eq!(el.nth_of_type, 1);
        assert!(el.has_parent);
        assert!(el.text.is_empty());
        assert!(el.name.is_none());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(Snapshot::from_json("not json").is_err());
        assert!(Snapshot::from_json(r#"{"elements":[{"visible":true}]}"#).is_err());
    }

    #[test]
    fn query_first_ignores_visibility() {
        let snap = Snapshot::new(vec![
            ElementInfo::new("input").with_type("email").hidden(),
            ElementInfo::new("input").with_type("email").with_id("second"),
        ]);
        let rule = crate::rules::EMAIL_RULES[0];
        let first = snap.query_first(&rule).unwrap();
        assert!(!snap.is_visible(first));
        assert_eq!(snap.query_all(&rule).count(), 2);
    }

    #[test]
    fn scan_selector_covers_inputs_and_categories() {
        assert_eq!(
            scan_selector(),
            r#"input, button, [role="button"], input[type="button"], a, div, span"#
        );
    }

    #[test]
    fn script_is_invoked_with_arguments() {
        let js = snapshot_script();
        assert!(js.contains("JSON.stringify({ elements })"));
        assert!(js.contains("CSS.escape(el.id)"));
        assert!(!js.contains("maxText"));
        assert!(js.contains(r#"\"button\""#));
    }
}
