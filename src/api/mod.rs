// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::{ApiError, ErrorBody, ErrorDetail},
    models::{
        CreateProductRequest, ProductResponse, PurchaseRequest, ReviewRequest, ReviewResponse,
        UserMeResponse, UserSummary,
    },
    state::AppState,
    storage::{PurchaseStatus, StoredProduct, StoredPurchase, StoredReview, StoredUser},
};

pub mod health;
pub mod products;
pub mod purchases;
pub mod reviews;
pub mod users;

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    let api_routes = Router::new()
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/products/{id}", get(products::get_product))
        .route(
            "/products/{id}/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/products/{id}/purchases/{user_id}",
            put(purchases::record_purchase),
        )
        .route("/reviews/{id}", delete(reviews::delete_review))
        .route("/users/me", get(users::get_current_user));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_layer(allowed_origins)),
        )
}

/// CORS for the browser frontend. Invalid origins are skipped.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            // A wildcard cannot be combined with credentials
            Ok(value) if value != "*" => Some(value),
            _ => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Parse a numeric path id, naming the entity on failure.
pub(crate) fn parse_id(raw: &str, entity: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid {entity} id")))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        products::list_products,
        products::create_product,
        products::get_product,
        reviews::list_reviews,
        reviews::create_review,
        reviews::delete_review,
        purchases::record_purchase,
        users::get_current_user
    ),
    components(
        schemas(
            StoredProduct,
            StoredReview,
            StoredUser,
            StoredPurchase,
            PurchaseStatus,
            ProductResponse,
            ReviewResponse,
            UserSummary,
            CreateProductRequest,
            ReviewRequest,
            PurchaseRequest,
            UserMeResponse,
            ErrorBody,
            ErrorDetail,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Products", description = "Product catalog"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Purchases", description = "Purchase records for the review gate"),
        (name = "Users", description = "Current user")
    )
)]
pub struct ApiDoc;
