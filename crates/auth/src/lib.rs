//! `fabdesk-auth`: who is acting, and what they are allowed to do.
//!
//! This crate is decoupled from HTTP and storage. The API layer verifies a
//! bearer token, turns its claims into an [`Actor`] and passes that actor to
//! every service call; policy checks below are pure functions over it.

pub mod actor;
pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod roles;

pub use actor::Actor;
pub use authorize::{AuthzError, require_admin, require_machine, require_owner_or_admin};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use roles::Role;
