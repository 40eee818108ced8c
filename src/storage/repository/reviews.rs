// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Review repository.
//!
//! Reviews always belong to a product and to the local user who wrote them.
//! The `reviews_by_user_product` index points at the latest review a user
//! wrote for a product and backs the one-review-per-user upsert.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    all_rows, encode_row, get_row, next_id, sequence, CatalogDatabase, StoreError, StoreResult,
    PRODUCTS, REVIEWS, REVIEWS_BY_USER_PRODUCT,
};

/// Review stored in the `reviews` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredReview {
    pub id: u64,
    pub product_id: u64,
    /// Local id of the author
    pub user_id: u64,
    pub title: Option<String>,
    /// Rating between 1 and 5
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredReview {
    /// Local id of the user who owns this review.
    pub fn owner_user_id(&self) -> u64 {
        self.user_id
    }
}

/// Validated review content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDraft {
    pub title: Option<String>,
    pub rating: u8,
    pub comment: String,
}

/// Outcome of a review write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewWrite {
    Created(StoredReview),
    Updated(StoredReview),
}

impl ReviewWrite {
    pub fn review(&self) -> &StoredReview {
        match self {
            ReviewWrite::Created(review) | ReviewWrite::Updated(review) => review,
        }
    }
}

/// Repository for review operations.
pub struct ReviewRepository<'a> {
    db: &'a CatalogDatabase,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new ReviewRepository.
    pub fn new(db: &'a CatalogDatabase) -> Self {
        Self { db }
    }

    /// Insert a new review unconditionally.
    pub fn insert(
        &self,
        product_id: u64,
        user_id: u64,
        draft: &ReviewDraft,
    ) -> StoreResult<StoredReview> {
        let write_txn = self.db.raw().begin_write()?;
        ensure_product(&write_txn, product_id)?;

        let review = new_review(&write_txn, product_id, user_id, draft)?;
        write_review(&write_txn, &review)?;
        write_txn.commit()?;

        Ok(review)
    }

    /// Insert a review, or overwrite the user's existing review of the product.
    ///
    /// The lookup and the write happen in one write transaction, so two
    /// concurrent submissions from the same user never produce two rows.
    pub fn upsert(
        &self,
        product_id: u64,
        user_id: u64,
        draft: &ReviewDraft,
    ) -> StoreResult<ReviewWrite> {
        let write_txn = self.db.raw().begin_write()?;
        ensure_product(&write_txn, product_id)?;

        let existing_id = {
            let index = write_txn.open_table(REVIEWS_BY_USER_PRODUCT)?;
            let found = index.get((user_id, product_id))?.map(|v| v.value());
            found
        };

        let existing = match existing_id {
            Some(review_id) => {
                let table = write_txn.open_table(REVIEWS)?;
                let row = get_row::<StoredReview, _>(&table, review_id)?;
                row
            }
            None => None,
        };

        let outcome = match existing {
            Some(mut review) => {
                review.title = draft.title.clone();
                review.rating = draft.rating;
                review.comment = draft.comment.clone();
                review.updated_at = Utc::now();
                write_review(&write_txn, &review)?;
                ReviewWrite::Updated(review)
            }
            None => {
                let review = new_review(&write_txn, product_id, user_id, draft)?;
                write_review(&write_txn, &review)?;
                ReviewWrite::Created(review)
            }
        };
        write_txn.commit()?;

        Ok(outcome)
    }

    /// Get a review by id.
    pub fn get(&self, review_id: u64) -> StoreResult<Option<StoredReview>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(REVIEWS)?;
        get_row(&table, review_id)
    }

    /// List the reviews of a product, newest first.
    pub fn list_by_product(&self, product_id: u64) -> StoreResult<Vec<StoredReview>> {
        let mut reviews: Vec<StoredReview> = self
            .list_all()?
            .into_iter()
            .filter(|review| review.product_id == product_id)
            .collect();
        reviews.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(reviews)
    }

    /// All reviews grouped by product id, newest first within each product.
    pub fn group_by_product(&self) -> StoreResult<HashMap<u64, Vec<StoredReview>>> {
        let mut grouped: HashMap<u64, Vec<StoredReview>> = HashMap::new();
        for review in self.list_all()?.into_iter().rev() {
            grouped.entry(review.product_id).or_default().push(review);
        }
        Ok(grouped)
    }

    /// Delete a review and its index entry.
    pub fn delete(&self, review_id: u64) -> StoreResult<()> {
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut table = write_txn.open_table(REVIEWS)?;
            let removed = {
                let guard = table.remove(review_id)?;
                match guard {
                    Some(value) => Some(serde_json::from_slice::<StoredReview>(value.value())?),
                    None => None,
                }
            };
            let review =
                removed.ok_or_else(|| StoreError::NotFound(format!("Review {review_id}")))?;

            let mut index = write_txn.open_table(REVIEWS_BY_USER_PRODUCT)?;
            let key = (review.user_id, review.product_id);
            let points_here = index.get(key)?.map(|v| v.value()) == Some(review_id);
            if points_here {
                index.remove(key)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list_all(&self) -> StoreResult<Vec<StoredReview>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(REVIEWS)?;
        all_rows(&table)
    }
}

fn ensure_product(txn: &redb::WriteTransaction, product_id: u64) -> StoreResult<()> {
    let products = txn.open_table(PRODUCTS)?;
    let exists = products.get(product_id)?.is_some();
    if exists {
        Ok(())
    } else {
        Err(StoreError::NotFound(format!("Product {product_id}")))
    }
}

fn new_review(
    txn: &redb::WriteTransaction,
    product_id: u64,
    user_id: u64,
    draft: &ReviewDraft,
) -> StoreResult<StoredReview> {
    let now = Utc::now();
    Ok(StoredReview {
        id: next_id(txn, sequence::REVIEWS)?,
        product_id,
        user_id,
        title: draft.title.clone(),
        rating: draft.rating,
        comment: draft.comment.clone(),
        created_at: now,
        updated_at: now,
    })
}

fn write_review(txn: &redb::WriteTransaction, review: &StoredReview) -> StoreResult<()> {
    let json = encode_row(review)?;
    let mut table = txn.open_table(REVIEWS)?;
    table.insert(review.id, json.as_slice())?;

    let mut index = txn.open_table(REVIEWS_BY_USER_PRODUCT)?;
    index.insert((review.user_id, review.product_id), review.id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_db;
    use crate::storage::repository::products::{tests::new_product, ProductRepository};

    fn draft(rating: u8, comment: &str) -> ReviewDraft {
        ReviewDraft {
            title: None,
            rating,
            comment: comment.to_string(),
        }
    }

    fn seeded() -> (CatalogDatabase, tempfile::TempDir, u64) {
        let (db, dir) = temp_db();
        let product = ProductRepository::new(&db)
            .create(&new_product("Product A", None))
            .unwrap();
        (db, dir, product.id)
    }

    #[test]
    fn upsert_creates_then_updates_in_place() {
        let (db, _dir, product_id) = seeded();
        let repo = ReviewRepository::new(&db);

        let first = repo.upsert(product_id, 7, &draft(3, "ok")).unwrap();
        let ReviewWrite::Created(created) = first else {
            panic!("first write should create");
        };

        let second = repo.upsert(product_id, 7, &draft(5, "great")).unwrap();
        let ReviewWrite::Updated(updated) = second else {
            panic!("second write should update");
        };

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.rating, 5);
        assert_eq!(updated.comment, "great");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(repo.list_by_product(product_id).unwrap().len(), 1);
    }

    #[test]
    fn upsert_keeps_reviews_of_different_users_apart() {
        let (db, _dir, product_id) = seeded();
        let repo = ReviewRepository::new(&db);

        repo.upsert(product_id, 1, &draft(4, "a")).unwrap();
        repo.upsert(product_id, 2, &draft(2, "b")).unwrap();

        assert_eq!(repo.list_by_product(product_id).unwrap().len(), 2);
    }

    #[test]
    fn insert_allows_multiple_reviews_per_user() {
        let (db, _dir, product_id) = seeded();
        let repo = ReviewRepository::new(&db);

        repo.insert(product_id, 1, &draft(4, "first")).unwrap();
        repo.insert(product_id, 1, &draft(1, "second")).unwrap();

        let reviews = repo.list_by_product(product_id).unwrap();
        assert_eq!(reviews.len(), 2);
        // Newest first
        assert_eq!(reviews[0].comment, "second");
    }

    #[test]
    fn writes_require_existing_product() {
        let (db, _dir) = temp_db();
        let repo = ReviewRepository::new(&db);

        let result = repo.upsert(99, 1, &draft(4, "nope"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        let result = repo.insert(99, 1, &draft(4, "nope"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_removes_review_and_frees_upsert_slot() {
        let (db, _dir, product_id) = seeded();
        let repo = ReviewRepository::new(&db);

        let written = repo.upsert(product_id, 3, &draft(4, "x")).unwrap();
        let review_id = written.review().id;
        repo.delete(review_id).unwrap();

        assert!(repo.get(review_id).unwrap().is_none());
        assert!(matches!(repo.delete(review_id), Err(StoreError::NotFound(_))));

        let again = repo.upsert(product_id, 3, &draft(2, "y")).unwrap();
        assert!(matches!(again, ReviewWrite::Created(_)));
    }

    #[test]
    fn group_by_product_orders_newest_first() {
        let (db, _dir) = temp_db();
        let products = ProductRepository::new(&db);
        let a = products.create(&new_product("A", None)).unwrap();
        let b = products.create(&new_product("B", None)).unwrap();

        let repo = ReviewRepository::new(&db);
        repo.insert(a.id, 1, &draft(1, "a1")).unwrap();
        repo.insert(b.id, 1, &draft(2, "b1")).unwrap();
        repo.insert(a.id, 2, &draft(3, "a2")).unwrap();

        let grouped = repo.group_by_product().unwrap();
        let a_comments: Vec<_> = grouped[&a.id].iter().map(|r| r.comment.as_str()).collect();
        assert_eq!(a_comments, vec!["a2", "a1"]);
        assert_eq!(grouped[&b.id].len(), 1);
    }
}
