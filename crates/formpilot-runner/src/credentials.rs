use formpilot_detect::Role;
use serde::Deserialize;
use std::fmt;

/// Values typed into a signup form.
///
/// `Debug` never prints either password.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Falls back to `password` when unset.
    #[serde(default)]
    pub confirm_password: Option<String>,
}

impl Credentials {
    /// Value to type into the field for `role`. `Submit` has none.
    pub fn value_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Firstname => Some(self.firstname.as_str()),
            Role::Lastname => Some(self.lastname.as_str()),
            Role::Email => Some(self.email.as_str()),
            Role::Password => Some(self.password.as_str()),
            Role::ConfirmPassword => {
                Some(self.confirm_password.as_deref().unwrap_or(&self.password))
            }
            Role::Submit => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("firstname", &self.firstname)
            .field("lastname", &self.lastname)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field(
                "confirm_password",
                &self.confirm_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
