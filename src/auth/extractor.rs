// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the request authorization pipeline.
//!
//! Each extractor advances the request one stage further:
//!
//! ```text
//! Authenticated  token verified, claims available
//! Identified     claims reconciled onto a local user
//! CatalogReader  Authenticated + configured read role
//! AdminOnly      Authenticated + configured admin role
//! ```
//!
//! A failed stage rejects the request before the handler runs.
//!
//! ```rust,ignore
//! async fn me(Identified { claims, user }: Identified) -> impl IntoResponse {
//!     // user is the local StoredUser for claims.subject
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::claims::ExternalClaims;
use super::error::AuthError;
use super::reconcile::IdentityReconciler;
use super::roles::RoleRequirement;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{StoredUser, UserRepository};

/// Extractor for a verified token.
pub struct Authenticated(pub ExternalClaims);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already verified by an earlier extractor on this request
        if let Some(claims) = parts.extensions.get::<ExternalClaims>().cloned() {
            return Ok(Authenticated(claims));
        }

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let claims = state
            .verifier
            .verify_authorization(header)
            .await
            .inspect_err(|err| {
                if let AuthError::InvalidOrExpired(reason) = err {
                    tracing::warn!(code = reason.code(), %reason, path = %parts.uri.path(), "Token rejected");
                }
            })?;

        parts.extensions.insert(claims.clone());
        Ok(Authenticated(claims))
    }
}

/// Extractor for a verified token mapped onto a local user.
pub struct Identified {
    pub claims: ExternalClaims,
    pub user: StoredUser,
}

impl FromRequestParts<AppState> for Identified {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Authenticated(claims) = Authenticated::from_request_parts(parts, state).await?;

        if let Some(user) = parts.extensions.get::<StoredUser>().cloned() {
            return Ok(Identified { claims, user });
        }

        let users = UserRepository::new(&state.db);
        let user = IdentityReconciler::new(&users).reconcile(&claims)?;

        parts.extensions.insert(user.clone());
        Ok(Identified { claims, user })
    }
}

/// Extractor that requires the configured catalog read role.
pub struct CatalogReader(pub ExternalClaims);

impl FromRequestParts<AppState> for CatalogReader {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = require_role(parts, state, &state.policy.read_role).await?;
        Ok(CatalogReader(claims))
    }
}

/// Extractor that requires the configured admin role.
pub struct AdminOnly(pub ExternalClaims);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = require_role(parts, state, &state.policy.admin_role).await?;
        Ok(AdminOnly(claims))
    }
}

async fn require_role(
    parts: &mut Parts,
    state: &AppState,
    requirement: &RoleRequirement,
) -> Result<ExternalClaims, AuthError> {
    let Authenticated(claims) = Authenticated::from_request_parts(parts, state).await?;

    requirement.check(&claims).into_result().inspect_err(|err| {
        tracing::warn!(subject = %claims.subject, %err, "Access denied");
    })?;

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::TokenRejection;
    use crate::auth::test_support::{bearer, test_state, JwksServer};
    use crate::auth::Denial;
    use axum::http::Request;

    fn parts_with(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn authenticated_requires_auth_header() {
        let server = JwksServer::start().await;
        let (state, _dir) = test_state(&server);
        let mut parts = parts_with(None);

        let result = Authenticated::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingCredential)));
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn authenticated_succeeds_with_signed_token() {
        let server = JwksServer::start().await;
        let (state, _dir) = test_state(&server);
        let mut parts = parts_with(Some(&bearer("kc-1", &["guest"])));

        let Authenticated(claims) = Authenticated::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(claims.subject, "kc-1");
        assert!(parts.extensions.get::<ExternalClaims>().is_some());
    }

    #[tokio::test]
    async fn authenticated_rejects_forged_token() {
        let server = JwksServer::start().await;
        let (state, _dir) = test_state(&server);
        let mut parts = parts_with(Some("Bearer eyJhbGciOiJSUzI1NiJ9.e30.c2ln"));

        let result = Authenticated::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidOrExpired(_))));
    }

    #[tokio::test]
    async fn authenticated_prefers_extensions() {
        let server = JwksServer::start().await;
        let (state, _dir) = test_state(&server);
        let mut parts = parts_with(Some("Bearer ignored"));

        let claims = ExternalClaims::from_token(
            serde_json::from_value(serde_json::json!({
                "sub": "kc-cached", "iss": "https://id.example.com", "exp": 1
            }))
            .unwrap(),
        )
        .unwrap();
        parts.extensions.insert(claims);

        let Authenticated(claims) = Authenticated::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(claims.subject, "kc-cached");
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn identified_creates_local_user_once() {
        let server = JwksServer::start().await;
        let (state, _dir) = test_state(&server);
        let header = bearer("kc-7", &[]);

        let first = Identified::from_request_parts(&mut parts_with(Some(&header)), &state)
            .await
            .unwrap();
        let second = Identified::from_request_parts(&mut parts_with(Some(&header)), &state)
            .await
            .unwrap();

        assert_eq!(first.user.id, second.user.id);
        assert_eq!(first.user.external_id, "kc-7");
        assert_eq!(UserRepository::new(&state.db).count().unwrap(), 1);
    }

    #[tokio::test]
    async fn admin_only_denies_guest() {
        let server = JwksServer::start().await;
        let (state, _dir) = test_state(&server);
        let mut parts = parts_with(Some(&bearer("kc-1", &["guest"])));

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(
            result,
            Err(AuthError::Denied(Denial::RealmRole(ref role))) if role == "admin"
        ));
    }

    #[tokio::test]
    async fn catalog_reader_accepts_guest() {
        let server = JwksServer::start().await;
        let (state, _dir) = test_state(&server);
        let mut parts = parts_with(Some(&bearer("kc-1", &["guest"])));

        assert!(CatalogReader::from_request_parts(&mut parts, &state)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn expired_token_is_rejected_before_role_check() {
        let server = JwksServer::start().await;
        let (state, _dir) = test_state(&server);
        let mut claims = crate::auth::test_support::claims_for("kc-1", &["admin"]);
        claims["exp"] = serde_json::json!(chrono::Utc::now().timestamp() - 3600);
        let header = format!("Bearer {}", crate::auth::test_support::sign_token(&claims));

        let result = AdminOnly::from_request_parts(&mut parts_with(Some(&header)), &state).await;
        assert!(matches!(
            result,
            Err(AuthError::InvalidOrExpired(TokenRejection::Expired))
        ));
    }
}
