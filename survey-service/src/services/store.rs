//! Collection-scoped access to a document store.
//!
//! [`DocumentStore`] is a thin pass-through: it adds no retries, transactions
//! or consistency guarantees on top of the backend. The one rule it does
//! enforce is that updates are operator documents (`$set`, `$unset`, `$inc`);
//! whole-document replacement through an update call is rejected.

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use service_core::error::AppError;
use thiserror::Error;

/// Update operators accepted by `update_one`/`update_many`.
pub const SUPPORTED_UPDATE_OPERATORS: &[&str] = &["$set", "$unset", "$inc"];

#[derive(Debug, Error)]
pub enum StoreError {
    /// No open connection: closed, unreachable, or the call timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation failed: {0}")]
    OperationFailed(String),

    #[error("invalid update spec: {0}")]
    InvalidUpdateSpec(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidUpdateSpec(_) => AppError::BadRequest(anyhow::Error::new(err)),
            StoreError::Unavailable(_) | StoreError::OperationFailed(_) => {
                AppError::DatabaseError(anyhow::Error::new(err))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, returning its `_id` (generated when absent).
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError>;

    /// Insert documents in order. An empty batch is a no-op.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Bson>, StoreError>;

    /// All documents matching `filter` (`None` matches everything).
    async fn find(
        &self,
        collection: &str,
        filter: Option<Document>,
        projection: Option<Document>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, StoreError>;

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, StoreError>;

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, StoreError>;

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, StoreError>;

    /// Release the connection. Calling it again is a no-op.
    async fn close(&self);

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Reject anything that is not a non-empty document of supported operators,
/// each mapping to a document of field updates.
pub fn validate_update(update: &Document) -> Result<(), StoreError> {
    if update.is_empty() {
        return Err(StoreError::InvalidUpdateSpec(
            "update must contain at least one operator".to_string(),
        ));
    }

    for (key, value) in update {
        if !key.starts_with('$') {
            return Err(StoreError::InvalidUpdateSpec(format!(
                "'{}' is not an update operator; use $set to change fields",
                key
            )));
        }
        if !SUPPORTED_UPDATE_OPERATORS.contains(&key.as_str()) {
            return Err(StoreError::InvalidUpdateSpec(format!(
                "unsupported update operator '{}'",
                key
            )));
        }
        match value {
            Bson::Document(fields) if !fields.is_empty() => {}
            Bson::Document(_) => {
                return Err(StoreError::InvalidUpdateSpec(format!(
                    "{} requires at least one field",
                    key
                )))
            }
            other => {
                return Err(StoreError::InvalidUpdateSpec(format!(
                    "{} expects a document of field updates, got {:?}",
                    key,
                    other.element_type()
                )))
            }
        }
    }

    Ok(())
}
