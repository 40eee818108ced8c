// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification against the identity provider's key set.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};

use super::claims::{ExternalClaims, TokenClaims};
use super::error::{AuthError, TokenRejection};
use super::jwks::JwksManager;

/// Default clock skew tolerance (60 seconds).
pub const DEFAULT_LEEWAY_SECS: u64 = 60;

/// Verifies access tokens for one issuer.
///
/// Built once at startup and shared read-only; the only mutable state is
/// inside the key cache.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: JwksManager,
    issuer: String,
    /// When unset, the `aud` claim is not checked
    audience: Option<String>,
    leeway: u64,
}

impl TokenVerifier {
    pub fn new(keys: JwksManager, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: None,
            leeway: DEFAULT_LEEWAY_SECS,
        }
    }

    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway = leeway_secs;
        self
    }

    pub fn keys(&self) -> &JwksManager {
        &self.keys
    }

    /// Verify the raw value of an `Authorization` header.
    pub async fn verify_authorization(
        &self,
        header: Option<&str>,
    ) -> Result<ExternalClaims, AuthError> {
        let token = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        self.verify(token).await.map_err(AuthError::InvalidOrExpired)
    }

    /// Verify a compact JWS and extract its claims.
    ///
    /// Signature, algorithm, issuer, expiry (with leeway), not-before and,
    /// when configured, audience are all checked before any claim is read.
    pub async fn verify(&self, token: &str) -> Result<ExternalClaims, TokenRejection> {
        let header = decode_header(token).map_err(|_| TokenRejection::Malformed)?;

        let key = self.keys.resolve_key(header.kid.as_deref()).await?;
        if header.alg != key.algorithm {
            return Err(TokenRejection::AlgorithmMismatch);
        }

        let mut validation = Validation::new(key.algorithm);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let data = decode::<TokenClaims>(token, &key.key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                ErrorKind::ImmatureSignature => TokenRejection::NotYetValid,
                ErrorKind::InvalidSignature => TokenRejection::InvalidSignature,
                ErrorKind::InvalidIssuer => TokenRejection::InvalidIssuer,
                ErrorKind::InvalidAudience => TokenRejection::InvalidAudience,
                ErrorKind::InvalidAlgorithm => TokenRejection::AlgorithmMismatch,
                ErrorKind::MissingRequiredClaim(claim) => {
                    TokenRejection::MissingClaim(claim.clone())
                }
                _ => TokenRejection::Malformed,
            }
        })?;

        let claims = ExternalClaims::from_token(data.claims)?;
        if claims.issuer != self.issuer {
            return Err(TokenRejection::InvalidIssuer);
        }
        if let Some(audience) = &self.audience {
            if !claims.audience.iter().any(|aud| aud == audience) {
                return Err(TokenRejection::InvalidAudience);
            }
        }

        Ok(claims)
    }
}
