//! The generic resolver: interprets the rule table against a snapshot.

use tracing::debug;

use crate::rules::{rules_for, CandidateRule, SUBMIT_SCAN, SUBMIT_VOCABULARY};
use crate::snapshot::{ElementInfo, Snapshot};
use crate::{Detection, Locator, Role};

/// Resolve every role against `dom`. Roles resolve independently; a role
/// with no visible match is left absent.
pub fn detect(dom: &Snapshot) -> Detection {
    let mut detection = Detection::default();
    for role in Role::FIELDS {
        detection.set(role, resolve(dom, rules_for(role)));
    }
    detection.set(Role::Submit, resolve_submit(dom));
    debug!(
        "detected {}/{} roles from {} elements",
        detection.len(),
        Role::ALL.len(),
        dom.len()
    );
    detection
}

/// First rule whose first match is visible. The locator is the rule's own
/// selector, so re-querying it later lands on the same element.
pub fn resolve(dom: &Snapshot, rules: &[CandidateRule]) -> Option<Locator> {
    rules
        .iter()
        .find(|rule| dom.query_first(rule).is_some_and(|el| dom.is_visible(el)))
        .map(|rule| Locator::new(rule.selector()))
}

/// Tier 1 canonical selectors, then a tier 2 text scan.
pub fn resolve_submit(dom: &Snapshot) -> Option<Locator> {
    resolve(dom, rules_for(Role::Submit)).or_else(|| scan_submit(dom))
}

/// Single pass in document order: the first visible element of any tier-2
/// category whose text carries a vocabulary term.
fn scan_submit(dom: &Snapshot) -> Option<Locator> {
    let candidates = dom
        .elements
        .iter()
        .filter(|el| SUBMIT_SCAN.iter().any(|category| category.matches(el)))
        .filter(|el| dom.is_visible(el) && has_submit_text(&el.text));
    for el in candidates {
        match locator_for(el) {
            Some(locator) => {
                debug!("submit matched by text {:?} -> {}", el.text.trim(), locator);
                return Some(locator);
            }
            None => debug!("submit candidate <{}> has no usable locator", el.tag),
        }
    }
    None
}

/// Case-insensitive substring match against the submit vocabulary.
pub fn has_submit_text(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    !text.is_empty() && SUBMIT_VOCABULARY.iter().any(|term| text.contains(term))
}

/// Locator for a tier-2 match: id, then name, then tag + position among
/// same-tag siblings. The positional form breaks if the page reorders
/// siblings; elements without a parent get no locator.
pub fn locator_for(el: &ElementInfo) -> Option<Locator> {
    if let Some(id) = el.id_selector.as_deref().filter(|sel| sel.len() > 1) {
        return Some(Locator::new(id));
    }
    if let Some(name) = el.name.as_deref().filter(|n| !n.is_empty()) {
        return Some(Locator::new(format!(
            "{}[name=\"{}\"]",
            el.tag,
            escape_attr_value(name)
        )));
    }
    if !el.has_parent {
        return None;
    }
    Some(Locator::new(format!("{}:nth-of-type({})", el.tag, el.nth_of_type)))
}

fn escape_attr_value(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"")
}
