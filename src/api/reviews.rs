// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Review endpoints.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};

use super::parse_id;
use crate::{
    auth::{
        authorize_ownership, authorize_purchase, AuthError, Authenticated, Decision, Identified,
        ReviewPolicy,
    },
    error::{ApiError, ApiJson, ApiPath},
    models::{ReviewRequest, ReviewResponse},
    state::AppState,
    storage::{
        CatalogDatabase, ProductRepository, PurchaseRepository, ReviewRepository, ReviewWrite,
        StoredReview, StoredUser, UserRepository,
    },
};

/// Attach author summaries, loading each author once.
pub(crate) fn with_authors(
    db: &CatalogDatabase,
    reviews: Vec<StoredReview>,
) -> Result<Vec<ReviewResponse>, ApiError> {
    let users = UserRepository::new(db);
    let mut authors: HashMap<u64, Option<StoredUser>> = HashMap::new();
    let mut response = Vec::with_capacity(reviews.len());

    for review in reviews {
        let author = match authors.entry(review.user_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(users.get(review.user_id)?),
        };
        response.push(ReviewResponse::new(review, author.as_ref()));
    }
    Ok(response)
}

/// List a product's reviews, newest first.
#[utoipa::path(
    get,
    path = "/api/products/{id}/reviews",
    params(("id" = u64, Path, description = "Product id")),
    tag = "Reviews",
    security(("bearer" = [])),
    responses(
        (status = 200, body = [ReviewResponse]),
        (status = 404, description = "product not found")
    )
)]
pub async fn list_reviews(
    Authenticated(_claims): Authenticated,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Vec<ReviewResponse>>, ApiError> {
    let product_id = parse_id(&id, "product")?;
    ProductRepository::new(&state.db)
        .get(product_id)?
        .ok_or_else(|| ApiError::not_found("product not found"))?;

    let reviews = ReviewRepository::new(&state.db).list_by_product(product_id)?;
    Ok(Json(with_authors(&state.db, reviews)?))
}

/// Write a review of a product as the calling user.
///
/// Under the one-per-user policy a second submission overwrites the
/// caller's existing review (200); otherwise a new review is created (201).
/// When the purchase policy requires it, the caller must have a paid
/// purchase of the product.
#[utoipa::path(
    post,
    path = "/api/products/{id}/reviews",
    params(("id" = u64, Path, description = "Product id")),
    request_body = ReviewRequest,
    tag = "Reviews",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 200, description = "Existing review updated", body = ReviewResponse),
        (status = 400, description = "Invalid product id"),
        (status = 403, description = "Product not purchased"),
        (status = 404, description = "product not found"),
        (status = 422, description = "rating must be 1..5")
    )
)]
pub async fn create_review(
    Identified { user, .. }: Identified,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    let product_id = parse_id(&id, "product")?;
    ProductRepository::new(&state.db)
        .get(product_id)?
        .ok_or_else(|| ApiError::not_found("product not found"))?;

    let draft = request.validate()?;

    let purchase = PurchaseRepository::new(&state.db).get(user.id, product_id)?;
    authorize_purchase(state.policy.purchase_policy, purchase.as_ref())
        .into_result()
        .inspect_err(|_| {
            tracing::warn!(user_id = user.id, product_id, "Review rejected, product not purchased");
        })?;

    let reviews = ReviewRepository::new(&state.db);
    let outcome = match state.policy.review_policy {
        ReviewPolicy::OnePerUser => reviews.upsert(product_id, user.id, &draft)?,
        ReviewPolicy::Unrestricted => {
            ReviewWrite::Created(reviews.insert(product_id, user.id, &draft)?)
        }
    };

    let (status, review) = match outcome {
        ReviewWrite::Created(review) => (StatusCode::CREATED, review),
        ReviewWrite::Updated(review) => (StatusCode::OK, review),
    };
    tracing::info!(review_id = review.id, user_id = user.id, product_id, %status, "Review written");

    Ok((status, Json(ReviewResponse::new(review, Some(&user)))))
}

/// Delete a review.
///
/// Only the author may delete a review; holders of the admin role may
/// delete any review.
#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(("id" = u64, Path, description = "Review id")),
    tag = "Reviews",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "review not found")
    )
)]
pub async fn delete_review(
    Identified { claims, user }: Identified,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let review_id = parse_id(&id, "review")?;
    let reviews = ReviewRepository::new(&state.db);
    let review = reviews
        .get(review_id)?
        .ok_or_else(|| ApiError::not_found("review not found"))?;

    let decision = authorize_ownership(&user, review.owner_user_id());
    if let Decision::Deny(denial) = decision {
        if !state.policy.admin_role.check(&claims).is_allowed() {
            tracing::warn!(user_id = user.id, review_id, "Review deletion denied");
            return Err(AuthError::Denied(denial).into());
        }
        tracing::info!(user_id = user.id, review_id, "Review deleted by admin");
    }

    reviews.delete(review_id)?;
    Ok(StatusCode::NO_CONTENT)
}
