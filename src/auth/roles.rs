// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role requirements for authorization.

use std::str::FromStr;

use super::claims::ExternalClaims;
use super::error::Denial;
use super::gate::Decision;

/// A role a caller must hold.
///
/// ## Forms
///
/// - `admin` - realm role, read from `realm_access.roles`
/// - `catalog-api:editor` - client role, read from
///   `resource_access["catalog-api"].roles`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleRequirement {
    Realm(String),
    Client { client_id: String, role: String },
}

impl RoleRequirement {
    pub fn realm(role: impl Into<String>) -> Self {
        RoleRequirement::Realm(role.into())
    }

    pub fn client(client_id: impl Into<String>, role: impl Into<String>) -> Self {
        RoleRequirement::Client {
            client_id: client_id.into(),
            role: role.into(),
        }
    }

    /// Decide whether the claims satisfy this requirement.
    ///
    /// Roles are matched exactly; there is no hierarchy between them.
    pub fn check(&self, claims: &ExternalClaims) -> Decision {
        match self {
            RoleRequirement::Realm(role) => {
                if claims.has_realm_role(role) {
                    Decision::Allow
                } else {
                    Decision::Deny(Denial::RealmRole(role.clone()))
                }
            }
            RoleRequirement::Client { client_id, role } => {
                if claims.has_client_role(client_id, role) {
                    Decision::Allow
                } else {
                    Decision::Deny(Denial::ClientRole {
                        client_id: client_id.clone(),
                        role: role.clone(),
                    })
                }
            }
        }
    }
}

/// Invalid role requirement string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role requirement `{0}`, expected `role` or `client:role`")]
pub struct ParseRoleError(String);

impl FromStr for RoleRequirement {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            None if !s.is_empty() => Ok(RoleRequirement::realm(s)),
            Some((client_id, role)) if !client_id.is_empty() && !role.is_empty() => {
                Ok(RoleRequirement::client(client_id, role))
            }
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

impl std::fmt::Display for RoleRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleRequirement::Realm(role) => write!(f, "{role}"),
            RoleRequirement::Client { client_id, role } => write!(f, "{client_id}:{role}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn claims(realm: &[&str], client: &[(&str, &str)]) -> ExternalClaims {
        let mut client_roles: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (client_id, role) in client {
            client_roles
                .entry(client_id.to_string())
                .or_default()
                .insert(role.to_string());
        }
        ExternalClaims {
            subject: "kc-1".into(),
            preferred_username: None,
            email: None,
            name: None,
            realm_roles: realm.iter().map(|r| r.to_string()).collect(),
            client_roles,
            issuer: "https://id.example.com".into(),
            audience: vec![],
            expires_at: 0,
        }
    }

    #[test]
    fn realm_role_must_be_present() {
        let requirement = RoleRequirement::realm("admin");
        assert_eq!(requirement.check(&claims(&["admin"], &[])), Decision::Allow);
        assert_eq!(
            requirement.check(&claims(&["guest"], &[])),
            Decision::Deny(Denial::RealmRole("admin".into()))
        );
    }

    #[test]
    fn admin_is_not_implicitly_guest() {
        let requirement = RoleRequirement::realm("guest");
        assert!(!requirement.check(&claims(&["admin"], &[])).is_allowed());
    }

    #[test]
    fn client_role_is_scoped_to_client() {
        let requirement = RoleRequirement::client("catalog-api", "editor");
        assert!(requirement
            .check(&claims(&[], &[("catalog-api", "editor")]))
            .is_allowed());
        assert!(!requirement
            .check(&claims(&["editor"], &[("other-app", "editor")]))
            .is_allowed());
    }

    #[test]
    fn from_str_parses_both_forms() {
        assert_eq!("admin".parse(), Ok(RoleRequirement::realm("admin")));
        assert_eq!(
            "catalog-api:editor".parse(),
            Ok(RoleRequirement::client("catalog-api", "editor"))
        );
        assert!("".parse::<RoleRequirement>().is_err());
        assert!(":editor".parse::<RoleRequirement>().is_err());
        assert!("catalog-api:".parse::<RoleRequirement>().is_err());
    }

    #[test]
    fn display_round_trips_config_form() {
        assert_eq!(RoleRequirement::client("a", "b").to_string(), "a:b");
        assert_eq!(RoleRequirement::realm("guest").to_string(), "guest");
    }
}
