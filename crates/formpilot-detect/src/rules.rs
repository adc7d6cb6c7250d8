//! Candidate rules: the declarative table the resolver interprets.
//!
//! Each role has an ordered list of rules. Earlier rules are more specific
//! (exact attribute matches); later ones are generic fallbacks.

use std::fmt;

use crate::snapshot::ElementInfo;
use crate::Role;

/// Attribute a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    Type,
    Name,
    Placeholder,
    Autocomplete,
    Role,
}

impl Attr {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attr::Type => "type",
            Attr::Name => "name",
            Attr::Placeholder => "placeholder",
            Attr::Autocomplete => "autocomplete",
            Attr::Role => "role",
        }
    }
}

/// How an attribute value is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// `[attr="value"]`
    Exact(&'static str),
    /// `[attr*="value" i]`
    Contains(&'static str),
}

/// One pattern-matching strategy for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateRule {
    /// Required tag name, or any tag when `None`.
    pub tag: Option<&'static str>,
    /// Required attribute condition, if any.
    pub attr: Option<(Attr, Match)>,
}

impl CandidateRule {
    /// Any element with this tag.
    pub const fn tag(tag: &'static str) -> Self {
        Self {
            tag: Some(tag),
            attr: None,
        }
    }

    /// `<input>` with an attribute condition.
    pub const fn input(attr: Attr, m: Match) -> Self {
        Self::with(Some("input"), attr, m)
    }

    /// Tag (or any tag) with an attribute condition.
    pub const fn with(tag: Option<&'static str>, attr: Attr, m: Match) -> Self {
        Self {
            tag,
            attr: Some((attr, m)),
        }
    }

    /// CSS selector that re-queries this rule in the page.
    pub fn selector(&self) -> String {
        let mut out = self.tag.unwrap_or_default().to_string();
        match self.attr {
            Some((attr, Match::Exact(v))) => {
                out.push_str(&format!("[{}=\"{}\"]", attr.as_str(), v));
            }
            Some((attr, Match::Contains(v))) => {
                out.push_str(&format!("[{}*=\"{}\" i]", attr.as_str(), v));
            }
            None => {}
        }
        if out.is_empty() {
            out.push('*');
        }
        out
    }

    /// Whether `el` satisfies this rule, with CSS attribute-selector semantics:
    /// a missing attribute never matches, `type` compares case-insensitively
    /// (HTML treats it as an enumerated attribute), substring matches are
    /// case-insensitive.
    pub fn matches(&self, el: &ElementInfo) -> bool {
        if let Some(tag) = self.tag {
            if !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        let Some((attr, m)) = self.attr else {
            return true;
        };
        let Some(value) = el.attr(attr) else {
            return false;
        };
        match m {
            Match::Exact(want) if attr == Attr::Type => value.eq_ignore_ascii_case(want),
            Match::Exact(want) => value == want,
            Match::Contains(want) => value.to_lowercase().contains(&want.to_lowercase()),
        }
    }
}

impl fmt::Display for CandidateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector())
    }
}

use Attr::{Autocomplete, Name, Placeholder, Type};
use Match::{Contains, Exact};

pub const FIRSTNAME_RULES: &[CandidateRule] = &[
    CandidateRule::input(Name, Contains("first")),
    CandidateRule::input(Placeholder, Contains("john")),
    CandidateRule::input(Autocomplete, Exact("given-name")),
];

pub const LASTNAME_RULES: &[CandidateRule] = &[
    CandidateRule::input(Name, Contains("last")),
    CandidateRule::input(Placeholder, Contains("doe")),
    CandidateRule::input(Autocomplete, Exact("family-name")),
];

pub const EMAIL_RULES: &[CandidateRule] = &[
    CandidateRule::input(Type, Exact("email")),
    CandidateRule::input(Name, Contains("email")),
    CandidateRule::input(Placeholder, Contains("email")),
    CandidateRule::input(Autocomplete, Exact("email")),
    CandidateRule::input(Autocomplete, Exact("username")),
    CandidateRule::input(Type, Exact("text")),
];

pub const PASSWORD_RULES: &[CandidateRule] = &[
    CandidateRule::input(Type, Exact("password")),
    CandidateRule::input(Name, Contains("pass")),
    CandidateRule::input(Placeholder, Contains("pass")),
    CandidateRule::input(Autocomplete, Exact("new-password")),
    CandidateRule::input(Autocomplete, Exact("current-password")),
];

/// The last entry matches any password input, so on a form without a
/// dedicated confirm field this resolves to the same element as `password`.
pub const CONFIRM_PASSWORD_RULES: &[CandidateRule] = &[
    CandidateRule::input(Name, Contains("confirm")),
    CandidateRule::input(Placeholder, Contains("confirm")),
    CandidateRule::input(Type, Exact("password")),
];

/// Tier 1: canonical submit controls.
pub const SUBMIT_RULES: &[CandidateRule] = &[
    CandidateRule::with(Some("button"), Type, Exact("submit")),
    CandidateRule::input(Type, Exact("submit")),
];

/// Tier 2: element categories scanned together, in document order, for
/// submit-like text.
pub const SUBMIT_SCAN: &[CandidateRule] = &[
    CandidateRule::tag("button"),
    CandidateRule::with(None, Attr::Role, Exact("button")),
    CandidateRule::input(Type, Exact("button")),
    CandidateRule::tag("a"),
    CandidateRule::tag("div"),
    CandidateRule::tag("span"),
];

/// Text that marks a tier-2 element as a submit control (lower-case).
pub const SUBMIT_VOCABULARY: &[&str] = &["create account", "sign up", "register", "continue", "submit"];

/// Ordered rules for a role. `Submit` returns the tier-1 rules.
pub fn rules_for(role: Role) -> &'static [CandidateRule] {
    match role {
        Role::Firstname => FIRSTNAME_RULES,
        Role::Lastname => LASTNAME_RULES,
        Role::Email => EMAIL_RULES,
        Role::Password => PASSWORD_RULES,
        Role::ConfirmPassword => CONFIRM_PASSWORD_RULES,
        Role::Submit => SUBMIT_RULES,
    }
}
