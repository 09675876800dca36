use thiserror::Error;

use moldtrack_core::UserId;

use crate::{Capability, Role};

/// A fully resolved principal for authorization decisions.
///
/// Construction is decoupled from transport: the API layer derives one from
/// validated token claims before any capability check runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing capability '{0}'")]
    Forbidden(String),
}

/// Authorize a principal for a capability.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: Capability) -> Result<(), AuthzError> {
    if principal
        .roles
        .iter()
        .any(|role| role.capabilities().contains(&required))
    {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
