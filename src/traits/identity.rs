//! Identity/session seam.

/// The signed-in user, as far as the chat core cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Stable id used to attribute new conversations.
    pub user_id: String,
    pub display_name: Option<String>,
}

pub trait IdentityProvider: Send + Sync {
    /// `None` when nobody is signed in.
    fn current_user(&self) -> Option<UserIdentity>;
}
