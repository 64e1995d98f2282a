use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::policy::PolicyError;

/// Role name used for RBAC grants and memberships.
///
/// Names are opaque, but must be representable in the policy text format:
/// non-empty, no commas, no whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn parse(name: impl Into<Cow<'static, str>>) -> Result<Self, PolicyError> {
        let name = name.into();
        if name.is_empty() || name.contains(',') || name.chars().any(char::is_whitespace) {
            return Err(PolicyError::InvalidName(name.into_owned()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert_eq!(Role::parse("admin").unwrap().as_str(), "admin");
        assert_eq!(Role::from_static("editor").to_string(), "editor");
    }

    #[test]
    fn rejects_names_that_break_policy_text() {
        assert!(Role::parse("").is_err());
        assert!(Role::parse("a,b").is_err());
        assert!(Role::parse("two words").is_err());
    }
}
