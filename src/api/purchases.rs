// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use super::parse_id;
use crate::{
    auth::AdminOnly,
    error::{ApiError, ApiJson, ApiPath},
    models::PurchaseRequest,
    state::AppState,
    storage::{ProductRepository, PurchaseRepository, StoredPurchase, UserRepository},
};

/// Record the purchase state of a product for a local user.
///
/// Feeds the purchase gate applied when reviews are written.
#[utoipa::path(
    put,
    path = "/api/products/{id}/purchases/{user_id}",
    params(
        ("id" = u64, Path, description = "Product id"),
        ("user_id" = u64, Path, description = "Local user id")
    ),
    request_body = PurchaseRequest,
    tag = "Purchases",
    security(("bearer" = [])),
    responses(
        (status = 200, body = StoredPurchase),
        (status = 403, description = "Missing admin role"),
        (status = 404, description = "product or user not found")
    )
)]
pub async fn record_purchase(
    AdminOnly(claims): AdminOnly,
    State(state): State<AppState>,
    ApiPath((id, user_id)): ApiPath<(String, String)>,
    ApiJson(request): ApiJson<PurchaseRequest>,
) -> Result<Json<StoredPurchase>, ApiError> {
    let product_id = parse_id(&id, "product")?;
    let user_id = parse_id(&user_id, "user")?;

    ProductRepository::new(&state.db)
        .get(product_id)?
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    UserRepository::new(&state.db)
        .get(user_id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    let purchase = PurchaseRepository::new(&state.db).record(user_id, product_id, request.status)?;
    tracing::info!(
        product_id,
        user_id,
        status = ?purchase.status,
        subject = %claims.subject,
        "Purchase recorded"
    );
    Ok(Json(purchase))
}
