use std::collections::HashMap;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::data_types::{
    CollectionType, ColumnDefinition, ColumnRef, DataType, ExternalId, RowNumber,
    RowSelector, TableDefinition, TableRef,
};
use crate::repository::interface::AllTableCellsResult;

pub mod metastore;
mod repository;

pub use repository::RepositoryStore;

/// How many times a modify re-reads a cell that another writer keeps changing
pub const DEFAULT_MODIFY_RETRIES: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    // Table errors
    #[error("Table {name:?} doesn't exist")]
    TableDoesNotExist { name: String },

    #[error("Table {name:?} already exists")]
    TableAlreadyExists { name: String },

    #[error("Name {name:?} is invalid: it must contain at least one letter, digit or '-'")]
    InvalidName { name: String },

    // Column errors
    #[error("Column {name:?} doesn't exist")]
    ColumnDoesNotExist { name: String },

    #[error("Column {name:?} already exists")]
    ColumnAlreadyExists { name: String },

    // Row and cell errors
    #[error("Column {column:?} has no cell for {row}")]
    CellDoesNotExist { column: String, row: String },

    #[error("Invalid data for column {column:?}: {reason}")]
    InvalidData { column: String, reason: String },

    #[error("Invalid key: {reason}")]
    InvalidKey { reason: String },

    #[error("Key {key:?} is already present in table {table:?}")]
    KeyAlreadyPresentInTable { key: String, table: String },

    #[error("Key {key:?} not found")]
    KeyNotFound { key: String },

    #[error(
        "Column {column:?} at {row} was modified concurrently {attempts} times in a row, giving up"
    )]
    ConcurrentModification {
        column: String,
        row: String,
        attempts: u32,
    },

    #[error("Not implemented: {reason}")]
    NotImplemented { reason: String },

    #[error("Internal SQL error: {0:?}")]
    SqlxError(sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

lazy_static! {
    static ref DISALLOWED_NAME_CHARACTERS: Regex =
        Regex::new(r"[^\p{Alphabetic}\p{N}-]").expect("static regex is valid");
}

/// Table and column names keep only letters, digits (in any script) and `-`.
/// A name that has nothing left after that is rejected.
pub fn normalize_name(name: &str) -> CatalogResult<String> {
    let normalized = DISALLOWED_NAME_CHARACTERS.replace_all(name, "");

    if normalized.is_empty() {
        Err(CatalogError::InvalidName {
            name: name.to_string(),
        })
    } else {
        Ok(normalized.into_owned())
    }
}

#[async_trait]
pub trait TableStore: Sync + Send {
    async fn create(
        &self,
        name: &str,
        collection_type: CollectionType,
        external_id: Option<ExternalId>,
    ) -> CatalogResult<TableDefinition>;

    async fn get(&self, table: &TableRef) -> CatalogResult<TableDefinition>;

    async fn list(&self) -> CatalogResult<Vec<TableDefinition>>;

    async fn rename(
        &self,
        table: &TableRef,
        new_name: &str,
    ) -> CatalogResult<TableDefinition>;

    async fn set_external_id(
        &self,
        table: &TableRef,
        external_id: Option<ExternalId>,
    ) -> CatalogResult<TableDefinition>;

    async fn delete(&self, table: &TableRef) -> CatalogResult<()>;
}

#[async_trait]
pub trait ColumnStore: Sync + Send {
    async fn create(
        &self,
        table: &TableRef,
        name: &str,
        data_type: DataType,
    ) -> CatalogResult<ColumnDefinition>;

    async fn get(&self, column: &ColumnRef) -> CatalogResult<ColumnDefinition>;

    async fn list(&self, table: &TableRef) -> CatalogResult<Vec<ColumnDefinition>>;

    async fn rename(
        &self,
        column: &ColumnRef,
        new_name: &str,
    ) -> CatalogResult<ColumnDefinition>;

    async fn delete(&self, column: &ColumnRef) -> CatalogResult<()>;
}

#[async_trait]
pub trait CellStore: Sync + Send {
    /// Adds a row and returns its number. Values that don't validate against
    /// their column's type are left empty.
    async fn add_row(
        &self,
        table: &TableRef,
        key: Option<&str>,
        values: &HashMap<String, String>,
    ) -> CatalogResult<RowNumber>;

    async fn delete_row(&self, table: &TableRef, row: &RowSelector) -> CatalogResult<()>;

    /// Overwrites several cells of one row; either every value is written or none is.
    async fn update_row(
        &self,
        table: &TableRef,
        row: &RowSelector,
        values: &HashMap<String, String>,
    ) -> CatalogResult<()>;

    async fn get_value(
        &self,
        table: &TableRef,
        column: &str,
        row: &RowSelector,
    ) -> CatalogResult<(Option<String>, DataType)>;

    async fn set_value(
        &self,
        table: &TableRef,
        column: &str,
        row: &RowSelector,
        value: &str,
    ) -> CatalogResult<()>;

    /// Adds `modifier` to a numeric cell, or replaces the value of any other
    /// cell. Returns the value that was stored.
    async fn modify_value(
        &self,
        table: &TableRef,
        column: &str,
        row: &RowSelector,
        modifier: &str,
    ) -> CatalogResult<String>;

    async fn list(&self, table: &TableRef) -> CatalogResult<Vec<AllTableCellsResult>>;
}
