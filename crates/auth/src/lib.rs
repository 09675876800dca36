//! `moldtrack-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod capabilities;
pub mod claims;
pub mod roles;

pub use authorize::{authorize, AuthzError, Principal};
pub use capabilities::Capability;
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use roles::Role;
