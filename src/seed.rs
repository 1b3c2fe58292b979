//! Seed bundles on disk.
//!
//! Layout: `<root>/<source folder>/<table>.json`, each file a JSON array of row
//! objects keyed by column name. A table without a file has no seed rows.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::value_objects::{SourceFolder, TableName};

pub type SeedRow = Map<String, Value>;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Seed source not found: {0}")]
    UnknownSource(String),

    #[error("Failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("Malformed seed file {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },
}

#[derive(Debug, Clone)]
pub struct SeedRepository {
    root: PathBuf,
}

impl SeedRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    pub fn path_for(&self, source: &SourceFolder, table: &TableName) -> PathBuf {
        self.root.join(source.as_str()).join(format!("{table}.json"))
    }

    /// Reads the seed rows for `table` from `source`.
    ///
    /// # Errors
    ///
    /// Fails when the source folder does not exist, the file cannot be read,
    /// or its content is not an array of objects.
    pub async fn load(&self, source: &SourceFolder, table: &TableName) -> Result<Vec<SeedRow>, SeedError> {
        let dir = self.root.join(source.as_str());
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(SeedError::UnknownSource(source.to_string()));
        }

        let path = self.path_for(source, table);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(%source, %table, "no seed file, nothing to insert");
                return Ok(vec![]);
            }
            Err(err) => return Err(SeedError::Io { path, source: err }),
        };

        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| SeedError::Malformed { path: path.clone(), message: e.to_string() })?;
        let Value::Array(items) = value else {
            return Err(SeedError::Malformed { path, message: "expected a JSON array of rows".into() });
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(row) => Ok(row),
                _ => Err(SeedError::Malformed { path: path.clone(), message: format!("row {i} is not an object") }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> TableName { TableName::new(name).unwrap() }

    fn repo_with(files: &[(&str, &str)]) -> (tempfile::TempDir, SeedRepository) {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("demo-data");
        std::fs::create_dir_all(&bundle).unwrap();
        for (name, body) in files {
            std::fs::write(bundle.join(name), body).unwrap();
        }
        let repo = SeedRepository::new(dir.path());
        (dir, repo)
    }

    #[tokio::test]
    async fn test_load_rows() {
        let (_dir, repo) = repo_with(&[("users.json", r#"[{"id": 1, "email": "a@example.com"}, {"id": 2, "email": "b@example.com"}]"#)]);
        let rows = repo.load(&SourceFolder::demo_data(), &table("users")).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["email"], "b@example.com");
    }

    #[tokio::test]
    async fn test_bundled_demo_data_loads() {
        let repo = SeedRepository::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("seed"));
        let order = crate::tables::TableOrder::storefront().unwrap();
        let mut total = 0;
        for t in order.insertion() {
            total += repo.load(&SourceFolder::demo_data(), t).await.unwrap().len();
        }
        assert!(total > 0);
    }

    #[tokio::test]
    async fn test_missing_file_means_no_rows() {
        let (_dir, repo) = repo_with(&[]);
        assert!(repo.load(&SourceFolder::demo_data(), &table("sessions")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_source() {
        let (_dir, repo) = repo_with(&[]);
        let err = repo.load(&SourceFolder::new("nope").unwrap(), &table("users")).await.unwrap_err();
        assert!(matches!(err, SeedError::UnknownSource(s) if s == "nope"));
    }

    #[tokio::test]
    async fn test_malformed_content() {
        let (_dir, repo) = repo_with(&[("users.json", r#"{"id": 1}"#), ("orders.json", r#"[{"id": 1}, 7]"#), ("carts.json", "[")]);
        let source = SourceFolder::demo_data();
        assert!(matches!(repo.load(&source, &table("users")).await, Err(SeedError::Malformed { .. })));
        let err = repo.load(&source, &table("orders")).await.unwrap_err();
        assert!(err.to_string().contains("row 1 is not an object"));
        assert!(matches!(repo.load(&source, &table("carts")).await, Err(SeedError::Malformed { .. })));
    }
}
