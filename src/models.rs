// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the REST API. All types derive `ToSchema` for OpenAPI documentation.
//!
//! Request types are deliberately loose (everything optional) so that
//! validation can report every problem at once in the uniform error shape
//! instead of failing on the first missing field during deserialization.
//!
//! ## Model Categories
//!
//! - **Products**: Catalog items, optionally with their reviews
//! - **Reviews**: Ratings and comments written by identified users
//! - **Purchases**: Admin-recorded purchase state feeding the purchase gate
//! - **Users**: The caller's local record and roles

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::storage::{
    NewProduct, PurchaseStatus, ReviewDraft, StoredProduct, StoredReview, StoredUser,
};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_CODE_LEN: usize = 100;
pub const MAX_IMAGE_URL_LEN: usize = 2048;
pub const MAX_TITLE_LEN: usize = 200;

/// Message for a missing, non-integer or out-of-range review rating.
pub const RATING_RANGE_MESSAGE: &str = "rating must be 1..5";

// =============================================================================
// Product Models
// =============================================================================

/// Request to create a catalog product.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    /// Display name, 1 to 200 characters
    pub name: Option<String>,
    /// Unique product code, up to 100 characters
    pub code: Option<String>,
    /// Price, must not be negative
    pub price: Option<f64>,
    /// Aggregate rating between 0 and 5
    pub rating: Option<f64>,
    /// Defaults to `true`
    pub available: Option<bool>,
    #[serde(alias = "imageUrl")]
    pub image_url: Option<String>,
    pub description: Option<String>,
}

impl CreateProductRequest {
    /// Check every field, returning all problems found.
    pub fn validate(self) -> Result<NewProduct, Vec<String>> {
        let mut problems = Vec::new();

        let name = self.name.map(|n| n.trim().to_string()).unwrap_or_default();
        if name.is_empty() {
            problems.push("name is required".to_string());
        } else if name.chars().count() > MAX_NAME_LEN {
            problems.push(format!("name must be at most {MAX_NAME_LEN} characters"));
        }

        let code = self
            .code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if code.as_ref().is_some_and(|c| c.chars().count() > MAX_CODE_LEN) {
            problems.push(format!("code must be at most {MAX_CODE_LEN} characters"));
        }

        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                problems.push("price must be greater than or equal to 0".to_string());
            }
        }

        if let Some(rating) = self.rating {
            if !(0.0..=5.0).contains(&rating) {
                problems.push("rating must be between 0 and 5".to_string());
            }
        }

        if self
            .image_url
            .as_ref()
            .is_some_and(|url| url.chars().count() > MAX_IMAGE_URL_LEN)
        {
            problems.push(format!(
                "image_url must be at most {MAX_IMAGE_URL_LEN} characters"
            ));
        }

        if !problems.is_empty() {
            return Err(problems);
        }

        Ok(NewProduct {
            name,
            code,
            price: self.price,
            rating: self.rating,
            available: self.available.unwrap_or(true),
            image_url: self.image_url,
            description: self.description,
        })
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ProductListQuery {
    /// `reviews` to embed each product's reviews
    pub include: Option<String>,
}

impl ProductListQuery {
    pub fn include_reviews(&self) -> bool {
        self.include
            .as_deref()
            .is_some_and(|include| include.split(',').any(|part| part.trim() == "reviews"))
    }
}

/// A product, with its reviews when requested.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: StoredProduct,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<ReviewResponse>>,
}

// =============================================================================
// Review Models
// =============================================================================

/// Request to write a review.
///
/// `stars` and `body` are accepted as aliases of `rating` and `comment`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReviewRequest {
    /// Integer from 1 to 5; numeric strings are accepted
    #[serde(alias = "stars")]
    #[schema(value_type = Option<u8>)]
    pub rating: Option<Value>,
    /// Optional headline, up to 200 characters
    pub title: Option<String>,
    /// Defaults to an empty string
    #[serde(alias = "body")]
    pub comment: Option<String>,
}

impl ReviewRequest {
    /// Validate into a draft. An unusable rating is a 422, other problems a 400.
    pub fn validate(self) -> Result<ReviewDraft, ApiError> {
        let rating = self
            .rating
            .as_ref()
            .and_then(parse_rating)
            .ok_or_else(|| ApiError::unprocessable(RATING_RANGE_MESSAGE))?;

        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if title
            .as_ref()
            .is_some_and(|t| t.chars().count() > MAX_TITLE_LEN)
        {
            return Err(ApiError::validation(vec![format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )]));
        }

        Ok(ReviewDraft {
            title,
            rating,
            comment: self.comment.unwrap_or_default(),
        })
    }
}

fn parse_rating(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.fract() != 0.0 || !(1.0..=5.0).contains(&number) {
        return None;
    }
    Some(number as u8)
}

/// Public summary of a review's author.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserSummary {
    pub id: u64,
    pub username: Option<String>,
    pub name: Option<String>,
}

impl From<&StoredUser> for UserSummary {
    fn from(user: &StoredUser) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
        }
    }
}

/// A review as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewResponse {
    #[serde(flatten)]
    pub review: StoredReview,
    /// Absent if the author record could not be loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<UserSummary>,
}

impl ReviewResponse {
    pub fn new(review: StoredReview, author: Option<&StoredUser>) -> Self {
        Self {
            review,
            author: author.map(UserSummary::from),
        }
    }
}

// =============================================================================
// Purchase Models
// =============================================================================

/// Request to record the purchase state of a product for a user.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PurchaseRequest {
    pub status: PurchaseStatus,
}

// =============================================================================
// User Models
// =============================================================================

/// Response for GET /api/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Local user record
    pub user: StoredUser,
    pub realm_roles: BTreeSet<String>,
    pub client_roles: BTreeMap<String, BTreeSet<String>>,
    /// Token expiration
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product_request(value: Value) -> CreateProductRequest {
        serde_json::from_value(value).unwrap()
    }

    fn review_request(value: Value) -> ReviewRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn product_defaults_to_available() {
        let product = product_request(json!({ "name": "Phone", "price": 999.99 }))
            .validate()
            .unwrap();
        assert!(product.available);
        assert_eq!(product.code, None);
    }

    #[test]
    fn product_validation_reports_every_problem() {
        let problems = product_request(json!({
            "name": "",
            "price": -1.0,
            "rating": 7.5,
            "code": "x".repeat(101),
        }))
        .validate()
        .unwrap_err();

        assert_eq!(problems.len(), 4);
        assert!(problems.contains(&"name is required".to_string()));
    }

    #[test]
    fn product_accepts_camel_case_image_url() {
        let product = product_request(json!({ "name": "A", "imageUrl": "https://img" }))
            .validate()
            .unwrap();
        assert_eq!(product.image_url.as_deref(), Some("https://img"));
    }

    #[test]
    fn include_reviews_parses_list() {
        let query = ProductListQuery {
            include: Some("owner, reviews".into()),
        };
        assert!(query.include_reviews());
        assert!(!ProductListQuery { include: None }.include_reviews());
    }

    #[test]
    fn review_accepts_canonical_and_alias_fields() {
        let draft = review_request(json!({ "rating": 4, "comment": "good" }))
            .validate()
            .unwrap();
        assert_eq!((draft.rating, draft.comment.as_str()), (4, "good"));

        let draft = review_request(json!({ "stars": "5", "body": "great", "title": "Wow" }))
            .validate()
            .unwrap();
        assert_eq!(draft.rating, 5);
        assert_eq!(draft.comment, "great");
        assert_eq!(draft.title.as_deref(), Some("Wow"));
    }

    #[test]
    fn review_comment_defaults_to_empty() {
        let draft = review_request(json!({ "rating": 1 })).validate().unwrap();
        assert_eq!(draft.comment, "");
    }

    #[test]
    fn review_rating_out_of_range_is_unprocessable() {
        for rating in [json!(6), json!(0), json!(4.5), json!("abc"), Value::Null] {
            let err = review_request(json!({ "rating": rating }))
                .validate()
                .unwrap_err();
            assert_eq!(err.status, axum::http::StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(err.message, RATING_RANGE_MESSAGE);
        }
    }

    #[test]
    fn review_title_too_long_is_bad_request() {
        let err = review_request(json!({ "rating": 3, "title": "t".repeat(201) }))
            .validate()
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
