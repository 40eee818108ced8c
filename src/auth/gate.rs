// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization decisions.
//!
//! Every check here is a pure function of already verified claims and
//! already loaded records, returning a [`Decision`] instead of failing.

use std::str::FromStr;

use super::claims::ExternalClaims;
use super::error::{AuthError, Denial};
use super::roles::RoleRequirement;
use crate::storage::{StoredPurchase, StoredUser};

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Turn a denial into an [`AuthError`] for early return from a handler.
    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(denial) => Err(AuthError::Denied(denial)),
        }
    }
}

/// Whether reviewing a product requires having bought it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PurchasePolicy {
    #[default]
    NotRequired,
    /// A purchase in `paid` state must exist
    RequirePaid,
}

/// How many reviews a user may leave on one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewPolicy {
    /// A second submission overwrites the first
    #[default]
    OnePerUser,
    /// Every submission inserts a new review
    Unrestricted,
}

/// Authorization settings for the catalog routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Needed to list products
    pub read_role: RoleRequirement,
    /// Needed to create products and record purchases; also overrides ownership
    pub admin_role: RoleRequirement,
    pub review_policy: ReviewPolicy,
    pub purchase_policy: PurchasePolicy,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            read_role: RoleRequirement::realm("guest"),
            admin_role: RoleRequirement::realm("admin"),
            review_policy: ReviewPolicy::default(),
            purchase_policy: PurchasePolicy::default(),
        }
    }
}

/// Unrecognised policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown policy `{0}`")]
pub struct ParsePolicyError(String);

impl FromStr for PurchasePolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not-required" => Ok(PurchasePolicy::NotRequired),
            "require-paid" => Ok(PurchasePolicy::RequirePaid),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

impl FromStr for ReviewPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one-per-user" => Ok(ReviewPolicy::OnePerUser),
            "unrestricted" => Ok(ReviewPolicy::Unrestricted),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

/// Require a realm role.
pub fn authorize_role(claims: &ExternalClaims, role: &str) -> Decision {
    RoleRequirement::realm(role).check(claims)
}

/// Require a role granted by a specific client.
pub fn authorize_client_role(claims: &ExternalClaims, client_id: &str, role: &str) -> Decision {
    RoleRequirement::client(client_id, role).check(claims)
}

/// Require that `user` owns a review whose author is `owner_id`.
pub fn authorize_ownership(user: &StoredUser, owner_id: u64) -> Decision {
    if user.id == owner_id {
        Decision::Allow
    } else {
        Decision::Deny(Denial::NotOwner { resource: "reviews" })
    }
}

/// Apply the purchase policy to the caller's purchase record, if any.
pub fn authorize_purchase(policy: PurchasePolicy, purchase: Option<&StoredPurchase>) -> Decision {
    match policy {
        PurchasePolicy::NotRequired => Decision::Allow,
        PurchasePolicy::RequirePaid => {
            if purchase.is_some_and(StoredPurchase::is_paid) {
                Decision::Allow
            } else {
                Decision::Deny(Denial::PurchaseRequired)
            }
        }
    }
}
