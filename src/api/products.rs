// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Product catalog endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use super::{parse_id, reviews::with_authors};
use crate::{
    auth::{AdminOnly, Authenticated, CatalogReader},
    error::{ApiError, ApiJson, ApiPath},
    models::{CreateProductRequest, ProductListQuery, ProductResponse},
    state::AppState,
    storage::{ProductRepository, ReviewRepository, StoredProduct},
};

/// List catalog products.
///
/// Requires the catalog read role. With `include=reviews`, each product
/// carries its reviews, newest first.
#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductListQuery),
    tag = "Products",
    security(("bearer" = [])),
    responses(
        (status = 200, body = [ProductResponse]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Missing read role")
    )
)]
pub async fn list_products(
    CatalogReader(_claims): CatalogReader,
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = ProductRepository::new(&state.db).list()?;

    if !query.include_reviews() {
        let response = products
            .into_iter()
            .map(|product| ProductResponse {
                product,
                reviews: None,
            })
            .collect();
        return Ok(Json(response));
    }

    let mut grouped = ReviewRepository::new(&state.db).group_by_product()?;
    let mut response = Vec::with_capacity(products.len());
    for product in products {
        let reviews = grouped.remove(&product.id).unwrap_or_default();
        response.push(ProductResponse {
            product,
            reviews: Some(with_authors(&state.db, reviews)?),
        });
    }
    Ok(Json(response))
}

/// Create a catalog product.
#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    tag = "Products",
    security(("bearer" = [])),
    responses(
        (status = 201, body = StoredProduct),
        (status = 400, description = "Validation error or duplicate code"),
        (status = 403, description = "Missing admin role")
    )
)]
pub async fn create_product(
    AdminOnly(claims): AdminOnly,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<StoredProduct>), ApiError> {
    let new_product = request.validate().map_err(ApiError::validation)?;
    let product = ProductRepository::new(&state.db).create(&new_product)?;

    tracing::info!(product_id = product.id, subject = %claims.subject, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get one product with its reviews.
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = u64, Path, description = "Product id")),
    tag = "Products",
    security(("bearer" = [])),
    responses(
        (status = 200, body = ProductResponse),
        (status = 400, description = "Invalid product id"),
        (status = 404, description = "product not found")
    )
)]
pub async fn get_product(
    Authenticated(_claims): Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = parse_id(&id, "product")?;
    let product = ProductRepository::new(&state.db)
        .get(product_id)?
        .ok_or_else(|| ApiError::not_found("product not found"))?;

    let reviews = ReviewRepository::new(&state.db).list_by_product(product_id)?;
    Ok(Json(ProductResponse {
        product,
        reviews: Some(with_authors(&state.db, reviews)?),
    }))
}
