//! Value Objects for demo-data runs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a database table taking part in a reset run.
///
/// Names are used verbatim as quoted SQL identifiers, so only ASCII
/// letters, digits and underscores are accepted and the first character
/// must be a letter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub const MAX_LEN: usize = 63;

    pub fn new(value: impl Into<String>) -> Result<Self, TableNameError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(TableNameError::Empty); }
        if value.len() > Self::MAX_LEN { return Err(TableNameError::TooLong); }
        let mut chars = value.chars();
        if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return Err(TableNameError::InvalidCharacter);
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(TableNameError::InvalidCharacter);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.pad(&self.0) }
}

impl TryFrom<String> for TableName {
    type Error = TableNameError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self { value.0 }
}

impl PartialEq<str> for TableName {
    fn eq(&self, other: &str) -> bool { self.0 == other }
}

impl PartialEq<&str> for TableName {
    fn eq(&self, other: &&str) -> bool { self.0 == *other }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum TableNameError { Empty, TooLong, InvalidCharacter }
impl std::error::Error for TableNameError {}
impl fmt::Display for TableNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "table name empty"),
            Self::TooLong => write!(f, "table name too long"),
            Self::InvalidCharacter => write!(f, "table name must be an ASCII identifier"),
        }
    }
}

/// Seed dataset identifier, e.g. `demo-data`.
///
/// Resolved as a single directory below the seed root, so path separators
/// and relative components are rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceFolder(String);

impl SourceFolder {
    pub const DEMO_DATA: &'static str = "demo-data";

    pub fn new(value: impl Into<String>) -> Result<Self, SourceFolderError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(SourceFolderError::Empty); }
        if value == "." || value == ".." { return Err(SourceFolderError::NotASingleSegment); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            return Err(SourceFolderError::NotASingleSegment);
        }
        Ok(Self(value))
    }
    pub fn demo_data() -> Self { Self(Self::DEMO_DATA.to_string()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SourceFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.pad(&self.0) }
}

impl TryFrom<String> for SourceFolder {
    type Error = SourceFolderError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<SourceFolder> for String {
    fn from(value: SourceFolder) -> Self { value.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SourceFolderError { Empty, NotASingleSegment }
impl std::error::Error for SourceFolderError {}
impl fmt::Display for SourceFolderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "source folder empty"),
            Self::NotASingleSegment => write!(f, "source folder must be a single path segment"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_table_name() {
        assert_eq!(TableName::new(" orderItems ").unwrap().as_str(), "orderItems");
        assert_eq!(TableName::new(""), Err(TableNameError::Empty));
        assert_eq!(TableName::new("1users"), Err(TableNameError::InvalidCharacter));
        assert_eq!(TableName::new("users\"; DROP"), Err(TableNameError::InvalidCharacter));
        assert_eq!(TableName::new("a".repeat(64)), Err(TableNameError::TooLong));
    }
    #[test]
    fn test_source_folder() {
        assert_eq!(SourceFolder::new("demo-data").unwrap(), SourceFolder::demo_data());
        assert_eq!(SourceFolder::new("prod_import.2024").unwrap().as_str(), "prod_import.2024");
        assert_eq!(SourceFolder::new("../etc"), Err(SourceFolderError::NotASingleSegment));
        assert_eq!(SourceFolder::new(".."), Err(SourceFolderError::NotASingleSegment));
        assert_eq!(SourceFolder::new("a/b"), Err(SourceFolderError::NotASingleSegment));
        assert_eq!(SourceFolder::new("  "), Err(SourceFolderError::Empty));
    }
    #[test]
    fn test_serde_validates() {
        let ok: TableName = serde_json::from_str("\"users\"").unwrap();
        assert_eq!(ok, "users");
        assert!(serde_json::from_str::<TableName>("\"no spaces\"").is_err());
    }
}
