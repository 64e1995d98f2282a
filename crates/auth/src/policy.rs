//! Role-based access control.
//!
//! The model is the classic RBAC one:
//!
//! ```text
//! p, <subject-or-role>, <object-pattern>, <action>   # grant
//! g, <subject-or-role>, <role>                       # membership
//! ```
//!
//! A request `(sub, obj, act)` is allowed iff some role reachable from `sub`
//! (including `sub` itself) has a grant whose pattern matches `obj` and whose
//! action matches `act`. There are no deny rules: no matching grant means deny.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use thiserror::Error;

use keystone_core::DomainError;

use crate::Role;

/// Membership chains longer than this are not followed.
pub const MAX_ROLE_DEPTH: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("invalid policy name '{0}'")]
    InvalidName(String),

    #[error("policy state is unavailable")]
    Unavailable,
}

impl From<PolicyError> for DomainError {
    fn from(err: PolicyError) -> Self {
        DomainError::dependency(err.to_string())
    }
}

/// Decides whether a subject may perform an action on an object.
///
/// Implementations must be safe for concurrent use by all request workers.
pub trait PolicyEnforcer: Send + Sync {
    fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, PolicyError>;
}

impl<T> PolicyEnforcer for std::sync::Arc<T>
where
    T: PolicyEnforcer + ?Sized,
{
    fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, PolicyError> {
        (**self).enforce(subject, object, action)
    }
}

/// A single grant rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyRule {
    pub subject: String,
    pub object: String,
    pub action: String,
}

impl PolicyRule {
    pub fn new(subject: impl Into<String>, object: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
        }
    }

    fn matches(&self, object: &str, action: &str) -> bool {
        key_match(object, &self.object) && action_match(action, &self.action)
    }
}

#[derive(Debug, Default)]
struct PolicySet {
    rules: Vec<PolicyRule>,
    memberships: HashMap<String, HashSet<Role>>,
}

impl PolicySet {
    /// Subject plus every role reachable through memberships (bounded depth).
    fn reachable(&self, subject: &str) -> HashSet<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();

        seen.insert(subject.to_string());
        queue.push_back((subject.to_string(), 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= MAX_ROLE_DEPTH {
                continue;
            }
            let Some(roles) = self.memberships.get(&current) else {
                continue;
            };
            for role in roles {
                if seen.insert(role.as_str().to_string()) {
                    queue.push_back((role.as_str().to_string(), depth + 1));
                }
            }
        }

        seen
    }
}

/// In-memory RBAC enforcer.
///
/// Rules are loaded once at startup; the mutation methods exist for
/// administrative changes and tests.
#[derive(Debug, Default)]
pub struct RbacPolicy {
    inner: RwLock<PolicySet>,
}

impl RbacPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse policy text (`p`/`g` lines, `#` comments, blank lines ignored).
    pub fn from_csv(text: &str) -> Result<Self, PolicyError> {
        let mut set = PolicySet::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
            if fields.iter().any(|f| f.is_empty()) {
                return Err(PolicyError::Parse {
                    line,
                    reason: "empty field".to_string(),
                });
            }

            match fields.as_slice() {
                ["p", sub, obj, act] => set.rules.push(PolicyRule::new(*sub, *obj, *act)),
                ["g", sub, role] => {
                    let role = Role::parse(role.to_string()).map_err(|e| PolicyError::Parse {
                        line,
                        reason: e.to_string(),
                    })?;
                    set.memberships.entry(sub.to_string()).or_default().insert(role);
                }
                [kind, ..] => {
                    return Err(PolicyError::Parse {
                        line,
                        reason: format!("unexpected '{kind}' line with {} fields", fields.len()),
                    });
                }
                [] => unreachable!("str::split yields at least one field"),
            }
        }

        tracing::debug!(rules = set.rules.len(), subjects = set.memberships.len(), "policy loaded");
        Ok(Self {
            inner: RwLock::new(set),
        })
    }

    pub fn add_policy(&self, rule: PolicyRule) -> Result<bool, PolicyError> {
        let mut set = self.inner.write().map_err(|_| PolicyError::Unavailable)?;
        if set.rules.contains(&rule) {
            return Ok(false);
        }
        set.rules.push(rule);
        Ok(true)
    }

    pub fn add_role_for_subject(&self, subject: &str, role: Role) -> Result<bool, PolicyError> {
        let mut set = self.inner.write().map_err(|_| PolicyError::Unavailable)?;
        Ok(set.memberships.entry(subject.to_string()).or_default().insert(role))
    }

    /// Every role `subject` holds, directly or transitively (sorted).
    pub fn roles_for_subject(&self, subject: &str) -> Result<Vec<String>, PolicyError> {
        let set = self.inner.read().map_err(|_| PolicyError::Unavailable)?;
        let mut roles: Vec<String> = set.reachable(subject).into_iter().filter(|r| r != subject).collect();
        roles.sort();
        Ok(roles)
    }

    /// The first grant that allows the request, if any.
    pub fn matching_rule(&self, subject: &str, object: &str, action: &str) -> Result<Option<PolicyRule>, PolicyError> {
        let set = self.inner.read().map_err(|_| PolicyError::Unavailable)?;
        let reachable = set.reachable(subject);

        Ok(set
            .rules
            .iter()
            .find(|rule| reachable.contains(&rule.subject) && rule.matches(object, action))
            .cloned())
    }
}

impl PolicyEnforcer for RbacPolicy {
    fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, PolicyError> {
        Ok(self.matching_rule(subject, object, action)?.is_some())
    }
}

/// Path matching with a trailing-segment wildcard: `/admin/*` matches
/// `/admin/users`, `*` matches everything, anything else is exact.
pub fn key_match(key: &str, pattern: &str) -> bool {
    match pattern.find('*') {
        None => key == pattern,
        Some(i) => key.starts_with(&pattern[..i]),
    }
}

/// Action matching: `*` or a case-insensitive exact match.
pub fn action_match(action: &str, pattern: &str) -> bool {
    pattern == "*" || action.eq_ignore_ascii_case(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const POLICY: &str = r#"
        # grants
        p, admin, /protected-resource, GET
        p, admin, /admin/*, *
        p, reader, /docs/*, GET

        # memberships
        g, 1, admin
        g, 2, reader
        g, editor, reader
        g, 3, editor
    "#;

    #[test]
    fn role_grant_allows_member() {
        let policy = RbacPolicy::from_csv(POLICY).unwrap();
        assert!(policy.enforce("1", "/protected-resource", "GET").unwrap());
    }

    #[test]
    fn ungranted_action_is_denied() {
        let policy = RbacPolicy::from_csv(POLICY).unwrap();
        assert!(!policy.enforce("1", "/protected-resource", "DELETE").unwrap());
    }

    #[test]
    fn non_member_is_denied() {
        let policy = RbacPolicy::from_csv(POLICY).unwrap();
        assert!(!policy.enforce("2", "/protected-resource", "GET").unwrap());
        assert!(!policy.enforce("99", "/protected-resource", "GET").unwrap());
    }

    #[test]
    fn wildcards_on_object_and_action() {
        let policy = RbacPolicy::from_csv(POLICY).unwrap();
        assert!(policy.enforce("1", "/admin/users", "POST").unwrap());
        assert!(!policy.enforce("1", "/administrator", "GET").unwrap());
    }

    #[test]
    fn memberships_are_transitive() {
        let policy = RbacPolicy::from_csv(POLICY).unwrap();
        assert!(policy.enforce("3", "/docs/intro", "get").unwrap());
        assert_eq!(policy.roles_for_subject("3").unwrap(), vec!["editor", "reader"]);
    }

    #[test]
    fn membership_cycles_terminate() {
        let policy = RbacPolicy::from_csv("g, a, b\ng, b, a\np, b, /x, GET").unwrap();
        assert!(policy.enforce("a", "/x", "GET").unwrap());
        assert!(!policy.enforce("a", "/y", "GET").unwrap());
    }

    #[test]
    fn chains_deeper_than_limit_are_not_followed() {
        let mut text = String::new();
        for i in 0..=MAX_ROLE_DEPTH {
            text.push_str(&format!("g, r{i}, r{}\n", i + 1));
        }
        text.push_str(&format!("p, r{}, /deep, GET\n", MAX_ROLE_DEPTH + 1));

        let policy = RbacPolicy::from_csv(&text).unwrap();
        assert!(!policy.enforce("r0", "/deep", "GET").unwrap());
        assert!(policy.enforce("r1", "/deep", "GET").unwrap());
    }

    #[test]
    fn runtime_grants_take_effect() {
        let policy = RbacPolicy::new();
        assert!(!policy.enforce("7", "/protected-resource", "GET").unwrap());

        policy.add_policy(PolicyRule::new("admin", "/protected-resource", "GET")).unwrap();
        policy.add_role_for_subject("7", Role::from_static("admin")).unwrap();

        assert!(policy.enforce("7", "/protected-resource", "GET").unwrap());
        assert!(!policy.add_policy(PolicyRule::new("admin", "/protected-resource", "GET")).unwrap());
    }

    #[test]
    fn reports_malformed_lines() {
        let err = RbacPolicy::from_csv("p, admin, /x\n").unwrap_err();
        assert!(matches!(err, PolicyError::Parse { line: 1, .. }));

        let err = RbacPolicy::from_csv("\n\nx, a, b\n").unwrap_err();
        assert!(matches!(err, PolicyError::Parse { line: 3, .. }));

        let err = RbacPolicy::from_csv("g, 1,\n").unwrap_err();
        assert!(matches!(err, PolicyError::Parse { line: 1, .. }));
    }

    proptest! {
        /// Property: a pattern always matches itself, and `prefix*` matches
        /// any extension of the prefix.
        #[test]
        fn key_match_prefix_wildcard(prefix in "/[a-z]{0,8}", rest in "[a-z/]{0,8}") {
            prop_assert!(key_match(&prefix, &prefix));
            let pattern = format!("{prefix}*");
            let key = format!("{prefix}{rest}");
            prop_assert!(key_match(&key, &pattern));
        }

        /// Property: without a grant for the action, the request is denied.
        #[test]
        fn no_grant_means_deny(action in "[A-Z]{3,6}") {
            let policy = RbacPolicy::from_csv("p, admin, /r, GET\ng, 1, admin").unwrap();
            prop_assume!(!action.eq_ignore_ascii_case("GET"));
            prop_assert!(!policy.enforce("1", "/r", &action).unwrap());
        }
    }
}
