//! Fixed identity for the CLI and tests.

use crate::traits::{IdentityProvider, UserIdentity};

/// Environment variable holding the user id for [`StaticIdentity::from_env`].
pub const USER_ID_ENV: &str = "PARLANCE_USER_ID";

/// Always reports the same user, or nobody.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<UserIdentity>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user: Some(UserIdentity {
                user_id: user_id.into(),
                display_name: None,
            }),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Set the display name (builder pattern)
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        if let Some(user) = self.user.as_mut() {
            user.display_name = Some(name.into());
        }
        self
    }

    /// Signed in as `$PARLANCE_USER_ID`, falling back to `default_user`.
    pub fn from_env(default_user: &str) -> Self {
        match std::env::var(USER_ID_ENV) {
            Ok(id) if !id.trim().is_empty() => Self::signed_in(id.trim()),
            _ => Self::signed_in(default_user),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserIdentity> {
        self.user.clone()
    }
}
