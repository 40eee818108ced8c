// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use chrono::DateTime;

use crate::auth::{ExternalClaims, Identified};
use crate::models::UserMeResponse;
use crate::storage::StoredUser;

impl UserMeResponse {
    fn new(claims: ExternalClaims, user: StoredUser) -> Self {
        Self {
            user,
            realm_roles: claims.realm_roles,
            client_roles: claims.client_roles,
            expires_at: DateTime::from_timestamp(claims.expires_at, 0),
        }
    }
}

/// Get the current user's local record and roles.
///
/// The first call for a new identity creates the local user.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(Identified { claims, user }: Identified) -> Json<UserMeResponse> {
    Json(UserMeResponse::new(claims, user))
}
