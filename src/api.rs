//! HTTP surface: the row-delete and row-insert endpoints the pipeline calls.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, routing::{get, post}, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::Validate;

use crate::domain::value_objects::{SourceFolder, TableName};
use crate::protocol::{
    DeleteRowsRequest, DeleteRowsResponse, ErrorResponse, InsertRowsRequest, InsertRowsResponse,
    DELETE_PATH, INSERT_PATH,
};
use crate::seed::{SeedError, SeedRepository};
use crate::store::{StoreError, TableStore};
use crate::tables::TableOrder;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TableStore>,
    pub seeds: Arc<SeedRepository>,
    pub tables: Arc<TableOrder>,
}

impl AppState {
    pub fn new(store: Arc<dyn TableStore>, seeds: SeedRepository, tables: TableOrder) -> Self {
        Self { store, seeds: Arc::new(seeds), tables: Arc::new(tables) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownTable(_) | ApiError::Seed(SeedError::UnknownSource(_)) => StatusCode::NOT_FOUND,
            ApiError::Seed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(StoreError::Rejected(_)) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "seed request failed");
        } else {
            tracing::warn!(error = %self, %status, "seed request rejected");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-demo-data"})) }))
        .route(DELETE_PATH, post(delete_rows))
        .route(INSERT_PATH, post(insert_rows))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn known_table(state: &AppState, raw: &str) -> Result<TableName, ApiError> {
    let table = TableName::new(raw).map_err(|e| ApiError::BadRequest(format!("Invalid table name: {e}")))?;
    if !state.tables.contains(&table) {
        return Err(ApiError::UnknownTable(table.to_string()));
    }
    Ok(table)
}

async fn delete_rows(State(s): State<AppState>, Json(r): Json<DeleteRowsRequest>) -> Result<Json<DeleteRowsResponse>, ApiError> {
    r.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let table = known_table(&s, &r.table_name)?;
    let records_deleted = s.store.delete_all(&table).await?;
    tracing::info!(%table, records_deleted, "table emptied");
    Ok(Json(DeleteRowsResponse { records_deleted }))
}

async fn insert_rows(State(s): State<AppState>, Json(r): Json<InsertRowsRequest>) -> Result<Json<InsertRowsResponse>, ApiError> {
    r.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let table = known_table(&s, &r.table_name)?;
    let source = SourceFolder::new(r.source_folder).map_err(|e| ApiError::BadRequest(format!("Invalid source folder: {e}")))?;
    let rows = s.seeds.load(&source, &table).await?;
    let records_inserted = s.store.insert_rows(&table, rows).await?;
    tracing::info!(%table, %source, records_inserted, "seed rows inserted");
    Ok(Json(InsertRowsResponse { records_inserted }))
}
