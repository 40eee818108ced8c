// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Product repository.
//!
//! Products are catalog items. The optional `code` is unique across the
//! catalog and enforced through the `product_codes` index.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    all_rows, encode_row, get_row, next_id, sequence, CatalogDatabase, StoreError, StoreResult,
    PRODUCTS, PRODUCT_CODES,
};

/// Product stored in the `products` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredProduct {
    pub id: u64,
    pub name: String,
    /// Unique product code (SKU)
    pub code: Option<String>,
    pub price: Option<f64>,
    /// Aggregate rating between 0 and 5
    pub rating: Option<f64>,
    pub available: bool,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new product.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub code: Option<String>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub available: bool,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// Repository for product operations.
pub struct ProductRepository<'a> {
    db: &'a CatalogDatabase,
}

impl<'a> ProductRepository<'a> {
    /// Create a new ProductRepository.
    pub fn new(db: &'a CatalogDatabase) -> Self {
        Self { db }
    }

    /// Insert a product, rejecting duplicate codes.
    pub fn create(&self, product: &NewProduct) -> StoreResult<StoredProduct> {
        let write_txn = self.db.raw().begin_write()?;

        if let Some(code) = &product.code {
            let taken = {
                let codes = write_txn.open_table(PRODUCT_CODES)?;
                let found = codes.get(code.as_str())?.is_some();
                found
            };
            if taken {
                return Err(StoreError::Conflict(format!("Product code {code}")));
            }
        }

        let now = Utc::now();
        let stored = StoredProduct {
            id: next_id(&write_txn, sequence::PRODUCTS)?,
            name: product.name.clone(),
            code: product.code.clone(),
            price: product.price,
            rating: product.rating,
            available: product.available,
            image_url: product.image_url.clone(),
            description: product.description.clone(),
            created_at: now,
            updated_at: now,
        };

        {
            let json = encode_row(&stored)?;
            let mut table = write_txn.open_table(PRODUCTS)?;
            table.insert(stored.id, json.as_slice())?;

            if let Some(code) = &stored.code {
                let mut codes = write_txn.open_table(PRODUCT_CODES)?;
                codes.insert(code.as_str(), stored.id)?;
            }
        }
        write_txn.commit()?;

        Ok(stored)
    }

    /// Get a product by id.
    pub fn get(&self, product_id: u64) -> StoreResult<Option<StoredProduct>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(PRODUCTS)?;
        get_row(&table, product_id)
    }

    /// List all products in id order.
    pub fn list(&self) -> StoreResult<Vec<StoredProduct>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(PRODUCTS)?;
        all_rows(&table)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::database::tests::temp_db;

    pub(crate) fn new_product(name: &str, code: Option<&str>) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            code: code.map(str::to_string),
            price: Some(999.99),
            rating: None,
            available: true,
            image_url: None,
            description: Some("test product".to_string()),
        }
    }

    #[test]
    fn create_and_get_product() {
        let (db, _dir) = temp_db();
        let repo = ProductRepository::new(&db);

        let created = repo.create(&new_product("Iphone16", Some("Iphone16-2"))).unwrap();
        assert_eq!(created.id, 1);

        let loaded = repo.get(created.id).unwrap().unwrap();
        assert_eq!(loaded, created);
        assert!(repo.get(99).unwrap().is_none());
    }

    #[test]
    fn duplicate_code_is_a_conflict() {
        let (db, _dir) = temp_db();
        let repo = ProductRepository::new(&db);

        repo.create(&new_product("A", Some("SKU-1"))).unwrap();
        let result = repo.create(&new_product("B", Some("SKU-1")));
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        // The failed insert must not leave a row behind
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn products_without_code_do_not_collide() {
        let (db, _dir) = temp_db();
        let repo = ProductRepository::new(&db);

        repo.create(&new_product("A", None)).unwrap();
        repo.create(&new_product("B", None)).unwrap();

        let names: Vec<_> = repo.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
