use super::store::{validate_update, DocumentStore, StoreError, UpdateOutcome};
use crate::config::MongoConfig;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use metrics::{counter, histogram};
use mongodb::{
    bson::{doc, Bson, Document},
    error::ErrorKind,
    options::{ClientOptions, FindOptions},
    Client as MongoClient, Collection,
};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// MongoDB-backed [`DocumentStore`].
///
/// The client is opened once in [`MongoStore::connect`] and held until
/// [`DocumentStore::close`]. It is a pool: each operation checks out a
/// connection and the driver returns it on success and failure alike.
pub struct MongoStore {
    client: RwLock<Option<MongoClient>>,
    database: String,
    operation_timeout: Duration,
}

impl MongoStore {
    pub async fn connect(config: &MongoConfig) -> Result<Self, StoreError> {
        let uri = config.uri();
        let operation_timeout = config.operation_timeout();
        tracing::info!(uri = %uri, "Connecting to MongoDB");

        let mut options = ClientOptions::parse(&uri).await.map_err(|e| {
            tracing::error!("Invalid MongoDB connection string {}: {}", uri, e);
            classify(e)
        })?;
        options.app_name = Some("survey-service".to_string());
        options.max_pool_size = Some(config.max_pool_size);
        options.connect_timeout = Some(operation_timeout);
        options.server_selection_timeout = Some(operation_timeout);

        let client = MongoClient::with_options(options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client for {}: {}", uri, e);
            classify(e)
        })?;

        tracing::info!(
            database = %config.database,
            max_pool_size = config.max_pool_size,
            "MongoDB client ready"
        );

        Ok(Self {
            client: RwLock::new(Some(client)),
            database: config.database.clone(),
            operation_timeout,
        })
    }

    async fn collection(&self, name: &str) -> Result<Collection<Document>, StoreError> {
        self.client
            .read()
            .await
            .as_ref()
            .map(|client| client.database(&self.database).collection(name))
            .ok_or_else(|| StoreError::Unavailable("connection is closed".to_string()))
    }

    /// Await a driver call under the per-operation timeout and record its latency.
    async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = mongodb::error::Result<T>>,
    {
        let start = Instant::now();

        let result = match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(outcome) => outcome.map_err(classify),
            Err(_) => Err(StoreError::Unavailable(format!(
                "{} timed out after {:?}",
                operation, self.operation_timeout
            ))),
        };

        histogram!("store_operation_duration_seconds", "operation" => operation)
            .record(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            counter!("store_operation_errors_total", "operation" => operation).increment(1);
            tracing::error!(operation, error = %e, "MongoDB operation failed");
        }

        result
    }
}

fn classify(err: mongodb::error::Error) -> StoreError {
    match *err.kind {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => StoreError::Unavailable(err.to_string()),
        _ => StoreError::OperationFailed(err.to_string()),
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
        let coll = self.collection(collection).await?;
        let result = self
            .run("insert_one", coll.insert_one(document, None))
            .await?;
        Ok(result.inserted_id)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Bson>, StoreError> {
        let coll = self.collection(collection).await?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let result = self
            .run("insert_many", coll.insert_many(documents, None))
            .await?;

        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn find(
        &self,
        collection: &str,
        filter: Option<Document>,
        projection: Option<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let coll = self.collection(collection).await?;
        let mut options = FindOptions::default();
        options.projection = projection;

        self.run("find", async {
            let cursor = coll.find(filter, options).await?;
            cursor.try_collect().await
        })
        .await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        let coll = self.collection(collection).await?;
        self.run("find_one", coll.find_one(filter, None)).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, StoreError> {
        validate_update(&update)?;
        let coll = self.collection(collection).await?;
        let result = self
            .run("update_one", coll.update_one(filter, update, None))
            .await?;
        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, StoreError> {
        validate_update(&update)?;
        let coll = self.collection(collection).await?;
        let result = self
            .run("update_many", coll.update_many(filter, update, None))
            .await?;
        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, StoreError> {
        let coll = self.collection(collection).await?;
        let result = self
            .run("delete_one", coll.delete_one(filter, None))
            .await?;
        Ok(result.deleted_count)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, StoreError> {
        let coll = self.collection(collection).await?;
        let result = self
            .run("delete_many", coll.delete_many(filter, None))
            .await?;
        Ok(result.deleted_count)
    }

    async fn close(&self) {
        let client = self.client.write().await.take();
        if let Some(client) = client {
            client.shutdown().await;
            tracing::info!("MongoDB connection closed");
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let admin = self
            .client
            .read()
            .await
            .as_ref()
            .map(|client| client.database("admin"))
            .ok_or_else(|| StoreError::Unavailable("connection is closed".to_string()))?;

        self.run("ping", admin.run_command(doc! { "ping": 1 }, None))
            .await
            .map(|_| ())
    }
}
