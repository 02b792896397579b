//! PostgreSQL-backed document store.
//!
//! Release documents live as JSONB rows in `release_documents`; collection
//! entries are appended to `collection_documents`. Every transaction runs at
//! `SERIALIZABLE`, so concurrent read-modify-write cycles on the same release
//! surface as serialization failures, which are mapped to
//! [`StoreErrorKind::Aborted`] for the retry executor.

use super::{DocumentStore, StoreError, StoreErrorKind, StoreResult, StoreTransaction};
use crate::config::DatabaseConfig;
use crate::models::{ReleaseDocument, ReleaseId};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl fmt::Debug for PgDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgDocumentStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl PgDocumentStore {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await
            .map_err(map_sqlx_error)?;

        info!(max_connections = config.max_connections, "Connected release document store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::internal(format!("migration failed: {err}")))
    }

    /// Documents of one collection in insertion order
    pub async fn collection(&self, name: &str) -> StoreResult<Vec<Value>> {
        sqlx::query_scalar::<_, Value>(
            "SELECT document FROM collection_documents WHERE collection = $1 ORDER BY created_at, seq",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

fn decode(document: Value) -> StoreResult<ReleaseDocument> {
    Ok(serde_json::from_value(document)?)
}

fn encode(document: &ReleaseDocument) -> StoreResult<Value> {
    Ok(serde_json::to_value(document)?)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn create(&self, document: ReleaseDocument) -> StoreResult<()> {
        let body = encode(&document)?;
        sqlx::query(
            "INSERT INTO release_documents (id, document, locked, updated_at) VALUES ($1, $2, $3, NOW())",
        )
        .bind(document.id().as_str())
        .bind(body)
        .bind(document.lock.is_held())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get(&self, id: &ReleaseId) -> StoreResult<Option<ReleaseDocument>> {
        sqlx::query_scalar::<_, Value>("SELECT document FROM release_documents WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(decode)
            .transpose()
    }

    async fn find_locked(&self) -> StoreResult<Vec<ReleaseDocument>> {
        sqlx::query_scalar::<_, Value>(
            "SELECT document FROM release_documents WHERE locked ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(decode)
        .collect()
    }

    async fn add(&self, collection: &str, document: Value) -> StoreResult<String> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO collection_documents (id, collection, document) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(collection)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(id.to_string())
    }
}

struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn get(&mut self, id: &ReleaseId) -> StoreResult<Option<ReleaseDocument>> {
        sqlx::query_scalar::<_, Value>(
            "SELECT document FROM release_documents WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?
        .map(decode)
        .transpose()
    }

    async fn update(&mut self, document: ReleaseDocument) -> StoreResult<()> {
        let body = encode(&document)?;
        let result = sqlx::query(
            "UPDATE release_documents SET document = $2, locked = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(document.id().as_str())
        .bind(body)
        .bind(document.lock.is_held())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!(
                "release {} not found",
                document.id()
            )));
        }
        Ok(())
    }

    async fn add(&mut self, collection: &str, document: Value) -> StoreResult<String> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO collection_documents (id, collection, document) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(collection)
        .bind(document)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(id.to_string())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

/// Translate a driver error into the store's failure categories
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    let kind = match &err {
        sqlx::Error::Database(db_err) => classify_sqlstate(db_err.code().as_deref()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreErrorKind::Unavailable
        }
        sqlx::Error::RowNotFound => StoreErrorKind::NotFound,
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => {
            StoreErrorKind::InvalidArgument
        }
        _ => StoreErrorKind::Unknown,
    };
    debug!(kind = %kind, error = %err, "Mapped database error");
    StoreError::new(kind, err.to_string())
}

fn classify_sqlstate(code: Option<&str>) -> StoreErrorKind {
    match code {
        Some("40001") | Some("40P01") => StoreErrorKind::Aborted,
        Some("57014") => StoreErrorKind::DeadlineExceeded,
        Some("23505") => StoreErrorKind::AlreadyExists,
        Some(code) if code.starts_with("53") => StoreErrorKind::ResourceExhausted,
        Some(code) if code.starts_with("08") => StoreErrorKind::Unavailable,
        _ => StoreErrorKind::Unknown,
    }
}
