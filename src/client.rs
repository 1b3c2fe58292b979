//! Seed endpoint seam and its HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::domain::value_objects::{SourceFolder, TableName};
use crate::protocol::{
    DeleteRowsRequest, DeleteRowsResponse, ErrorResponse, InsertRowsRequest, InsertRowsResponse,
    DELETE_PATH, INSERT_PATH,
};

/// Why a single table's delete or insert call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// Non-2xx response. `message` is the server's `error` field, or a generic
    /// fallback when the body carried none.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The request never completed.
    #[error("{0}")]
    Transport(String),

    /// 2xx response whose body could not be read.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// The two row endpoints the pipeline drives.
#[async_trait]
pub trait SeedEndpoint: Send + Sync {
    /// Deletes every row of `table` and returns how many went.
    async fn delete_rows(&self, table: &TableName) -> Result<u64, EndpointError>;

    /// Inserts the seed rows for `table` from `source` and returns how many went in.
    async fn insert_rows(&self, table: &TableName, source: &SourceFolder) -> Result<u64, EndpointError>;
}

#[async_trait]
impl<E: SeedEndpoint + ?Sized> SeedEndpoint for std::sync::Arc<E> {
    async fn delete_rows(&self, table: &TableName) -> Result<u64, EndpointError> {
        (**self).delete_rows(table).await
    }
    async fn insert_rows(&self, table: &TableName, source: &SourceFolder) -> Result<u64, EndpointError> {
        (**self).insert_rows(table, source).await
    }
}

/// [`SeedEndpoint`] over HTTP against a running seed service.
#[derive(Debug, Clone)]
pub struct HttpSeedClient {
    client: Client,
    base_url: String,
}

impl HttpSeedClient {
    /// Creates a client for `base_url` (e.g. `http://localhost:8083`).
    ///
    /// Without `timeout` requests wait as long as the transport does.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, EndpointError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| EndpointError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B, fallback: String) -> Result<R, EndpointError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(|e| EndpointError::Decode(e.to_string()))
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(EndpointError::Api { status: status.as_u16(), message: error_message(status, &text, fallback) })
        }
    }
}

fn error_message(status: StatusCode, body: &str, fallback: String) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { error }) if !error.trim().is_empty() => error,
        _ => format!("{fallback} (HTTP {})", status.as_u16()),
    }
}

#[async_trait]
impl SeedEndpoint for HttpSeedClient {
    async fn delete_rows(&self, table: &TableName) -> Result<u64, EndpointError> {
        let body = DeleteRowsRequest { table_name: table.to_string() };
        let response: DeleteRowsResponse =
            self.post(DELETE_PATH, &body, format!("Failed to delete records from {table}")).await?;
        Ok(response.records_deleted)
    }

    async fn insert_rows(&self, table: &TableName, source: &SourceFolder) -> Result<u64, EndpointError> {
        let body = InsertRowsRequest { table_name: table.to_string(), source_folder: source.to_string() };
        let response: InsertRowsResponse =
            self.post(INSERT_PATH, &body, format!("Failed to insert records into {table}")).await?;
        Ok(response.records_inserted)
    }
}
