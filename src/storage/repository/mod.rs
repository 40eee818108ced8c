// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the catalog database.
//!
//! Each repository provides the operations for a specific entity type,
//! using the CatalogDatabase for all transactions.

pub mod products;
pub mod purchases;
pub mod reviews;
pub mod users;

pub use products::{NewProduct, ProductRepository, StoredProduct};
pub use purchases::{PurchaseRepository, PurchaseStatus, StoredPurchase};
pub use reviews::{ReviewDraft, ReviewRepository, ReviewWrite, StoredReview};
pub use users::{StoredUser, UserProfile, UserRepository, UserStore};
