// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::ApiError;

/// Why a presented token was rejected.
///
/// Carried inside [`AuthError::InvalidOrExpired`] and surfaced in logs and in
/// the `details` field of the 401 response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("token is malformed")]
    Malformed,
    #[error("token is missing required claim `{0}`")]
    MissingClaim(String),
    #[error("no key matching id `{0}` in key set")]
    NoMatchingKey(String),
    #[error("key set unavailable: {0}")]
    KeySetUnavailable(String),
    #[error("token algorithm does not match signing key")]
    AlgorithmMismatch,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token issuer is invalid")]
    InvalidIssuer,
    #[error("token audience is invalid")]
    InvalidAudience,
    #[error("token has expired")]
    Expired,
    #[error("token is not yet valid")]
    NotYetValid,
}

impl TokenRejection {
    /// Stable machine-readable code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            TokenRejection::Malformed => "malformed_token",
            TokenRejection::MissingClaim(_) => "missing_claim",
            TokenRejection::NoMatchingKey(_) => "no_matching_key",
            TokenRejection::KeySetUnavailable(_) => "key_set_unavailable",
            TokenRejection::AlgorithmMismatch => "algorithm_mismatch",
            TokenRejection::InvalidSignature => "invalid_signature",
            TokenRejection::InvalidIssuer => "invalid_issuer",
            TokenRejection::InvalidAudience => "invalid_audience",
            TokenRejection::Expired => "token_expired",
            TokenRejection::NotYetValid => "token_not_yet_valid",
        }
    }
}

/// A negative authorization decision, naming what was missing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("Missing required role: {0}")]
    RealmRole(String),
    #[error("Missing {client_id} role: {role}")]
    ClientRole { client_id: String, role: String },
    #[error("You can only modify your own {resource}")]
    NotOwner { resource: &'static str },
    #[error("You can review only products you purchased")]
    PurchaseRequired,
}

/// Error raised by the request authorization pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header, or not a `Bearer` credential
    #[error("Missing Bearer token")]
    MissingCredential,
    /// Token failed verification
    #[error("Invalid or expired token")]
    InvalidOrExpired(TokenRejection),
    /// Authenticated, but not permitted
    #[error("{0}")]
    Denied(Denial),
}

impl AuthError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential | AuthError::InvalidOrExpired(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Denied(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl From<TokenRejection> for AuthError {
    fn from(reason: TokenRejection) -> Self {
        AuthError::InvalidOrExpired(reason)
    }
}

impl From<Denial> for AuthError {
    fn from(denial: Denial) -> Self {
        AuthError::Denied(denial)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = err.status_code();
        let message = err.to_string();
        let details = match &err {
            AuthError::MissingCredential => None,
            AuthError::InvalidOrExpired(reason) => Some(json!(reason.to_string())),
            AuthError::Denied(Denial::RealmRole(role)) => Some(json!(role)),
            AuthError::Denied(Denial::ClientRole { client_id, role }) => {
                Some(json!(format!("{client_id}:{role}")))
            }
            AuthError::Denied(_) => None,
        };
        ApiError::new(status, message).with_details(details)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
