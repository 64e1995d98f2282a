//! `keystone-core`: shared building blocks (identifiers, value objects, errors).
//!
//! This crate has no infrastructure concerns.

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::PrincipalId;
pub use value_object::{Email, ValueObject};
