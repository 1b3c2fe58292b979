//! Row storage behind the seed endpoints.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::value_objects::TableName;
use crate::seed::SeedRow;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Rejected(String),
}

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Removes every row from `table`.
    async fn delete_all(&self, table: &TableName) -> Result<u64, StoreError>;

    /// Inserts `rows` into `table`, all or nothing for that table.
    async fn insert_rows(&self, table: &TableName, rows: Vec<SeedRow>) -> Result<u64, StoreError>;
}

/// Postgres-backed store. Table names must already be allow-listed by the
/// caller; they are interpolated as quoted identifiers.
#[derive(Clone, Debug)]
pub struct PgTableStore {
    pool: PgPool,
}

impl PgTableStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn quoted(table: &TableName) -> String {
    // TableName only admits [A-Za-z0-9_], so no escaping is needed.
    format!("\"{table}\"")
}

#[async_trait]
impl TableStore for PgTableStore {
    async fn delete_all(&self, table: &TableName) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {}", quoted(table));
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn insert_rows(&self, table: &TableName, rows: Vec<SeedRow>) -> Result<u64, StoreError> {
        if rows.is_empty() { return Ok(0); }
        let t = quoted(table);
        let sql = format!("INSERT INTO {t} SELECT * FROM jsonb_populate_record(NULL::{t}, $1)");
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for row in rows {
            inserted += sqlx::query(&sql).bind(Json(row)).execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

/// In-process store for dry runs and tests. Tables listed as failing reject
/// every operation, which stands in for a constraint error.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: Mutex<HashMap<TableName, Vec<SeedRow>>>,
    failing: HashSet<String>,
}

impl MemoryTableStore {
    pub fn new() -> Self { Self::default() }

    pub fn failing_on(mut self, table: &str) -> Self {
        self.failing.insert(table.to_string());
        self
    }

    pub async fn seed(&self, table: &TableName, rows: Vec<SeedRow>) {
        self.tables.lock().await.entry(table.clone()).or_default().extend(rows);
    }

    pub async fn row_count(&self, table: &TableName) -> usize {
        self.tables.lock().await.get(table).map_or(0, Vec::len)
    }

    fn check(&self, table: &TableName, op: &str) -> Result<(), StoreError> {
        if self.failing.contains(table.as_str()) {
            return Err(StoreError::Rejected(format!("{op} on {table} violates a foreign key constraint")));
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn delete_all(&self, table: &TableName) -> Result<u64, StoreError> {
        self.check(table, "delete")?;
        let removed = self.tables.lock().await.remove(table).map_or(0, |rows| rows.len());
        Ok(removed as u64)
    }

    async fn insert_rows(&self, table: &TableName, rows: Vec<SeedRow>) -> Result<u64, StoreError> {
        self.check(table, "insert")?;
        let count = rows.len() as u64;
        self.seed(table, rows).await;
        Ok(count)
    }
}
