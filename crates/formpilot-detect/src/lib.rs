//! # formpilot-detect
//!
//! Heuristic detection of signup and login form fields on arbitrary pages.
//!
//! Detection works on a [`Snapshot`] taken inside the page by a single script
//! evaluation ([`snapshot_script`]). A declarative rule table maps each
//! [`Role`] to ordered [`CandidateRule`]s; [`detect`] interprets it and yields
//! a [`Detection`]: the best locator per role, or nothing.
//!
//! ```rust
//! use formpilot_detect::{detect, ElementInfo, Snapshot};
//!
//! let dom = Snapshot::new(vec![
//!     ElementInfo::new("input").with_type("email"),
//!     ElementInfo::new("input").with_type("password"),
//!     ElementInfo::new("button").with_type("submit").with_text("Create Account"),
//! ]);
//! let found = detect(&dom);
//! assert_eq!(found.email.unwrap().as_str(), r#"input[type="email"]"#);
//! ```
//!
//! Nothing here touches a browser; the caller evaluates the script and hands
//! back its JSON.

pub mod resolve;
pub mod rules;
pub mod snapshot;

pub use resolve::{detect, has_submit_text, locator_for, resolve, resolve_submit};
pub use rules::{rules_for, Attr, CandidateRule, Match, SUBMIT_VOCABULARY};
pub use snapshot::{scan_selector, snapshot_script, ElementInfo, Snapshot};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for detection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed DOM snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// A semantic form-field category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Firstname,
    Lastname,
    Email,
    Password,
    ConfirmPassword,
    Submit,
}

impl Role {
    /// Fillable roles, in the order they are filled.
    pub const FIELDS: [Role; 5] = [
        Role::Firstname,
        Role::Lastname,
        Role::Email,
        Role::Password,
        Role::ConfirmPassword,
    ];

    pub const ALL: [Role; 6] = [
        Role::Firstname,
        Role::Lastname,
        Role::Email,
        Role::Password,
        Role::ConfirmPassword,
        Role::Submit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Firstname => "firstname",
            Role::Lastname => "lastname",
            Role::Email => "email",
            Role::Password => "password",
            Role::ConfirmPassword => "confirm_password",
            Role::Submit => "submit",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A re-query recipe for "the element matching X" (a CSS selector).
///
/// Never a node handle: the page may re-render between detection and use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this locator depends on sibling position and so breaks if
    /// the page reorders elements.
    pub fn is_positional(&self) -> bool {
        self.0.contains(":nth-of-type(")
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Role -> locator mapping. Absent roles serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMap {
    #[serde(default)]
    pub firstname: Option<Locator>,
    #[serde(default)]
    pub lastname: Option<Locator>,
    #[serde(default)]
    pub email: Option<Locator>,
    #[serde(default)]
    pub password: Option<Locator>,
    #[serde(default)]
    pub confirm_password: Option<Locator>,
    #[serde(default)]
    pub submit: Option<Locator>,
}

/// What the detector found: best locator per role, if any.
pub type Detection = RoleMap;

impl RoleMap {
    pub fn get(&self, role: Role) -> Option<&Locator> {
        match role {
            Role::Firstname => self.firstname.as_ref(),
            Role::Lastname => self.lastname.as_ref(),
            Role::Email => self.email.as_ref(),
            Role::Password => self.password.as_ref(),
            Role::ConfirmPassword => self.confirm_password.as_ref(),
            Role::Submit => self.submit.as_ref(),
        }
    }

    pub fn set(&mut self, role: Role, locator: Option<Locator>) {
        let slot = match role {
            Role::Firstname => &mut self.firstname,
            Role::Lastname => &mut self.lastname,
            Role::Email => &mut self.email,
            Role::Password => &mut self.password,
            Role::ConfirmPassword => &mut self.confirm_password,
            Role::Submit => &mut self.submit,
        };
        *slot = locator;
    }

    /// Present field roles (everything but submit), in fill order.
    pub fn fields(&self) -> impl Iterator<Item = (Role, &Locator)> {
        Role::FIELDS
            .into_iter()
            .filter_map(move |role| self.get(role).map(|loc| (role, loc)))
    }

    /// Present roles, submit included.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &Locator)> {
        Role::ALL
            .into_iter()
            .filter_map(move |role| self.get(role).map(|loc| (role, loc)))
    }

    /// Number of roles present.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pairs of roles that resolved to the same locator, such as
    /// `confirm_password` falling back to the `password` input.
    pub fn aliased(&self) -> Vec<(Role, Role)> {
        let present: Vec<_> = self.iter().collect();
        let mut pairs = Vec::new();
        for (i, (a, la)) in present.iter().enumerate() {
            for (b, lb) in &present[i + 1..] {
                if la == lb {
                    pairs.push((*a, *b));
                }
            }
        }
        pairs
    }

    /// The three-field login shape.
    pub fn auth_form(&self) -> AuthForm {
        AuthForm {
            email_selector: self.email.clone(),
            password_selector: self.password.clone(),
            submit_selector: self.submit.clone(),
        }
    }
}

/// Email, password and submit locators of a login or signup form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthForm {
    pub email_selector: Option<Locator>,
    pub password_selector: Option<Locator>,
    pub submit_selector: Option<Locator>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names() {
        assert_eq!(Role::ConfirmPassword.to_string(), "confirm_password");
        assert_eq!(
            serde_json::to_string(&Role::ConfirmPassword).unwrap(),
            "\"confirm_password\""
        );
        assert_eq!(serde_json::to_string(&Role::Firstname).unwrap(), "\"firstname\"");
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn absent_roles_serialize_as_null() {
        let mut d = Detection::default();
        d.set(Role::Email, Some(Locator::from("input[type=\"email\"]")));
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["email"], "input[type=\"email\"]");
        assert!(v["firstname"].is_null());
        assert!(v["submit"].is_null());
        assert_eq!(v.as_object().unwrap().len(), 6);
    }

    #[test]
    fn auth_form_uses_camel_case() {
        let mut d = Detection::default();
        d.set(Role::Password, Some("input[type=\"password\"]".into()));
        let v = serde_json::to_value(d.auth_form()).unwrap();
        assert!(v["emailSelector"].is_null());
        assert_eq!(v["passwordSelector"], "input[type=\"password\"]");
        assert!(v["submitSelector"].is_null());
    }

    #[test]
    fn fields_follow_fill_order_and_skip_submit() {
        let mut d = Detection::default();
        d.set(Role::Submit, Some("#go".into()));
        d.set(Role::Password, Some("p".into()));
        d.set(Role::Firstname, Some("f".into()));
        let roles: Vec<Role> = d.fields().map(|(r, _)| r).collect();
        assert_eq!(roles, vec![Role::Firstname, Role::Password]);
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn aliased_pairs() {
        let mut d = Detection::default();
        assert!(d.aliased().is_empty());
        d.set(Role::Password, Some("x".into()));
        d.set(Role::ConfirmPassword, Some("x".into()));
        d.set(Role::Email, Some("y".into()));
        assert_eq!(d.aliased(), vec![(Role::Password, Role::ConfirmPassword)]);
    }

    #[test]
    fn get_set_round_trip() {
        let mut d = Detection::default();
        for role in Role::ALL {
            d.set(role, Some(Locator::new(role.as_str())));
        }
        for role in Role::ALL {
            assert_eq!(d.get(role).unwrap().as_str(), role.as_str());
        }
        d.set(Role::Email, None);
        assert!(d.get(Role::Email).is_none());
    }
}
