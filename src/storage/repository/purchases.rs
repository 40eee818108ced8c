// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Purchase repository.
//!
//! One purchase record per (user, product) pair. Only `paid` purchases
//! satisfy the purchase gate on review creation.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    encode_row, CatalogDatabase, StoreError, StoreResult, PRODUCTS, PURCHASES, USERS,
};

/// Purchase status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    /// Order placed, payment not settled
    Pending,
    /// Payment settled
    Paid,
    /// Payment returned to the customer
    Refunded,
}

/// Purchase record stored in the `purchases` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredPurchase {
    pub user_id: u64,
    pub product_id: u64,
    pub status: PurchaseStatus,
    pub recorded_at: DateTime<Utc>,
}

impl StoredPurchase {
    pub fn is_paid(&self) -> bool {
        self.status == PurchaseStatus::Paid
    }
}

/// Repository for purchase operations.
pub struct PurchaseRepository<'a> {
    db: &'a CatalogDatabase,
}

impl<'a> PurchaseRepository<'a> {
    /// Create a new PurchaseRepository.
    pub fn new(db: &'a CatalogDatabase) -> Self {
        Self { db }
    }

    /// Record (or replace) the purchase state of a product for a user.
    pub fn record(
        &self,
        user_id: u64,
        product_id: u64,
        status: PurchaseStatus,
    ) -> StoreResult<StoredPurchase> {
        let write_txn = self.db.raw().begin_write()?;
        {
            let users = write_txn.open_table(USERS)?;
            let user_exists = users.get(user_id)?.is_some();
            if !user_exists {
                return Err(StoreError::NotFound(format!("User {user_id}")));
            }

            let products = write_txn.open_table(PRODUCTS)?;
            let product_exists = products.get(product_id)?.is_some();
            if !product_exists {
                return Err(StoreError::NotFound(format!("Product {product_id}")));
            }
        }

        let purchase = StoredPurchase {
            user_id,
            product_id,
            status,
            recorded_at: Utc::now(),
        };

        {
            let json = encode_row(&purchase)?;
            let mut table = write_txn.open_table(PURCHASES)?;
            table.insert((user_id, product_id), json.as_slice())?;
        }
        write_txn.commit()?;

        Ok(purchase)
    }

    /// Get the purchase record of a product for a user.
    pub fn get(&self, user_id: u64, product_id: u64) -> StoreResult<Option<StoredPurchase>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(PURCHASES)?;
        match table.get((user_id, product_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}
