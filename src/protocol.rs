//! JSON bodies exchanged between the reset pipeline and the seed endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DELETE_PATH: &str = "/api/v1/demo-data/delete";
pub const INSERT_PATH: &str = "/api/v1/demo-data/insert";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowsRequest {
    #[validate(length(min = 1, max = 63))]
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowsResponse {
    pub records_deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InsertRowsRequest {
    #[validate(length(min = 1, max = 63))]
    pub table_name: String,
    #[validate(length(min = 1, max = 128))]
    pub source_folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InsertRowsResponse {
    pub records_inserted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}
