// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and the verified identity derived from them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::TokenRejection;
use crate::storage::UserProfile;

/// Claims as they appear in a Keycloak-style access token.
///
/// Only the claims the service reads are declared; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Subject - the identity provider's stable user identifier
    #[serde(default)]
    pub sub: Option<String>,

    /// Issuer
    #[serde(default)]
    pub iss: Option<String>,

    /// Audience, either a single string or a list
    #[serde(default)]
    pub aud: Option<Audience>,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub preferred_username: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    /// Realm-wide roles
    #[serde(default)]
    pub realm_access: Option<RoleList>,

    /// Per-client roles, keyed by client id
    #[serde(default)]
    pub resource_access: HashMap<String, RoleList>,
}

/// The `aud` claim, which may be a string or an array of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Audience::One(aud) => vec![aud],
            Audience::Many(auds) => auds,
        }
    }
}

/// A `{ "roles": [...] }` object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleList {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Verified identity extracted from an access token.
///
/// This is the primary type used throughout the application to represent
/// the caller of a request. It is only ever built from a token whose
/// signature, issuer, audience and expiry have been checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExternalClaims {
    /// Identity provider subject (`sub`)
    pub subject: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub realm_roles: BTreeSet<String>,

    pub client_roles: BTreeMap<String, BTreeSet<String>>,

    /// Issuer the token was verified against
    #[serde(skip)]
    pub issuer: String,

    #[serde(skip)]
    pub audience: Vec<String>,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl ExternalClaims {
    /// Build the verified identity from decoded claims.
    ///
    /// `sub`, `iss` and `exp` are mandatory. Empty profile strings are
    /// treated as absent.
    pub fn from_token(claims: TokenClaims) -> Result<Self, TokenRejection> {
        let subject = non_empty(claims.sub).ok_or(TokenRejection::MissingClaim("sub".into()))?;
        let issuer = non_empty(claims.iss).ok_or(TokenRejection::MissingClaim("iss".into()))?;
        let expires_at = claims
            .exp
            .ok_or(TokenRejection::MissingClaim("exp".into()))?;

        let realm_roles = claims
            .realm_access
            .map(|access| access.roles.into_iter().collect())
            .unwrap_or_default();

        let client_roles = claims
            .resource_access
            .into_iter()
            .map(|(client_id, access)| (client_id, access.roles.into_iter().collect()))
            .collect();

        Ok(Self {
            subject,
            preferred_username: non_empty(claims.preferred_username),
            email: non_empty(claims.email),
            name: non_empty(claims.name),
            realm_roles,
            client_roles,
            issuer,
            audience: claims.aud.map(Audience::into_vec).unwrap_or_default(),
            expires_at,
        })
    }

    /// Check for a realm role.
    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_roles.contains(role)
    }

    /// Check for a role granted by a specific client.
    pub fn has_client_role(&self, client_id: &str, role: &str) -> bool {
        self.client_roles
            .get(client_id)
            .is_some_and(|roles| roles.contains(role))
    }

    /// Profile fields to mirror onto the local user record.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.preferred_username.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> TokenClaims {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> serde_json::Value {
        json!({
            "sub": "kc-123",
            "iss": "https://id.example.com/realms/shop",
            "aud": "catalog-api",
            "exp": 1700003600,
            "preferred_username": "alice",
            "email": "",
            "realm_access": { "roles": ["guest", "offline_access"] },
            "resource_access": {
                "catalog-api": { "roles": ["editor"] }
            }
        })
    }

    #[test]
    fn from_token_extracts_identity_and_roles() {
        let claims = ExternalClaims::from_token(decode(sample())).unwrap();

        assert_eq!(claims.subject, "kc-123");
        assert_eq!(claims.preferred_username.as_deref(), Some("alice"));
        assert!(claims.has_realm_role("guest"));
        assert!(!claims.has_realm_role("admin"));
        assert!(claims.has_client_role("catalog-api", "editor"));
        assert!(!claims.has_client_role("other", "editor"));
        assert_eq!(claims.audience, vec!["catalog-api".to_string()]);
    }

    #[test]
    fn empty_profile_strings_are_absent() {
        let claims = ExternalClaims::from_token(decode(sample())).unwrap();
        assert_eq!(claims.email, None);
        assert_eq!(claims.profile().email, None);
    }

    #[test]
    fn audience_accepts_array() {
        let mut value = sample();
        value["aud"] = json!(["account", "catalog-api"]);
        let claims = ExternalClaims::from_token(decode(value)).unwrap();
        assert_eq!(claims.audience.len(), 2);
    }

    #[test]
    fn missing_roles_yield_empty_sets() {
        let claims = ExternalClaims::from_token(decode(json!({
            "sub": "kc-1",
            "iss": "https://id.example.com",
            "exp": 1
        })))
        .unwrap();
        assert!(claims.realm_roles.is_empty());
        assert!(claims.client_roles.is_empty());
    }

    #[test]
    fn missing_subject_is_rejected() {
        let mut value = sample();
        value["sub"] = json!("");
        let err = ExternalClaims::from_token(decode(value)).unwrap_err();
        assert_eq!(err, TokenRejection::MissingClaim("sub".into()));
    }
}
