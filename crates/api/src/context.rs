use moldtrack_auth::{Principal, Role};
use moldtrack_core::UserId;

/// Principal context for a request (authenticated identity + roles).
///
/// This is immutable and must be present for all protected routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Build the pure authorization principal for this request.
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            roles: self.roles.clone(),
        }
    }
}
