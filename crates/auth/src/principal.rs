use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_core::{Email, PrincipalId};

use crate::PasswordHash;

/// A registered identity as held by the credential store.
///
/// Deliberately not `Serialize`: the password hash must never leave the
/// service. Use [`Principal::profile`] for anything outward-facing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub name: String,
    pub email: Email,
    pub password_hash: PasswordHash,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// A principal about to be created (the store assigns the id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrincipal {
    pub name: String,
    pub email: Email,
    pub password_hash: PasswordHash,
}

/// Outward view of a principal: everything except the credential.
///
/// This is the shape returned by the API and the snapshot written to cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: PrincipalId,
    pub name: String,
    pub email: Email,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_serialization_has_no_credential() {
        let principal = Principal {
            id: PrincipalId::new(1),
            name: "Ann".to_string(),
            email: Email::parse("ann@x.com").unwrap(),
            password_hash: PasswordHash::from_encoded("$2b$04$abcdefghijklmnopqrstuu"),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(principal.profile()).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj["id"], 1);
        assert_eq!(obj["email"], "ann@x.com");
        assert!(!obj.contains_key("password"));
        assert!(!obj.contains_key("password_hash"));
    }
}
