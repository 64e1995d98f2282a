//! `keystone-auth`: authentication and authorization primitives.
//!
//! This crate is intentionally decoupled from HTTP and storage: it signs and
//! verifies bearer tokens, hashes passwords and evaluates RBAC policy, and
//! nothing else.

pub mod claims;
pub mod password;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod token;

pub use claims::{TokenClaims, TokenValidationError, validate_claims};
pub use password::{MAX_PASSWORD_BYTES, PasswordError, PasswordHash, PasswordHasher};
pub use policy::{PolicyEnforcer, PolicyError, PolicyRule, RbacPolicy};
pub use principal::{NewPrincipal, Principal, Profile};
pub use roles::Role;
pub use token::{IssuedToken, TokenError, TokenService};
