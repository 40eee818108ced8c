// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! OIDC bearer-token authentication and authorization for the catalog API.
//!
//! ## Auth Flow
//!
//! 1. The client authenticates with the identity provider (Keycloak realm)
//! 2. The client sends `Authorization: Bearer <access token>`
//! 3. The server:
//!    - Resolves the signing key from the realm's JWKS (cached)
//!    - Verifies signature, issuer, audience (when configured) and expiry
//!    - Extracts:
//!      - `sub` → local user via the identity reconciler
//!      - `realm_access.roles` and `resource_access.<client>.roles`
//!    - Applies role, ownership and purchase checks
//!
//! ## Security
//!
//! - Only `/health*` and `/docs` are reachable without a token
//! - The token algorithm is pinned to the resolved key's algorithm
//! - Clock skew tolerance defaults to 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod jwks;
pub mod reconcile;
pub mod roles;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::ExternalClaims;
pub use error::{AuthError, Denial, TokenRejection};
pub use extractor::{AdminOnly, Authenticated, CatalogReader, Identified};
pub use gate::{
    authorize_client_role, authorize_ownership, authorize_purchase, authorize_role,
    AccessPolicy, Decision, PurchasePolicy, ReviewPolicy,
};
pub use jwks::{JwksManager, KeySetError, VerificationKey};
pub use reconcile::IdentityReconciler;
pub use roles::RoleRequirement;
pub use verifier::TokenVerifier;
