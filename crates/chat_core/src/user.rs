use serde::{Deserialize, Serialize};

/// Reference to the authenticated user, supplied by the auth collaborator.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserRef {
    pub username: String,
    /// Identifier of the user's remote archive object.
    pub storage_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl UserRef {
    pub fn new(username: impl Into<String>, storage_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            storage_key: storage_key.into(),
            locale: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}
