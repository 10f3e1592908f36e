use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::data_types::{
    CellId, ColumnId, RowId, RowNumber, RowSelector, TableId, TableRef,
};

#[derive(sqlx::FromRow, Debug, PartialEq, Eq, Clone)]
pub struct TableRecord {
    pub id: TableId,
    pub name: String,
    pub collection_type: String,
    pub external_id: Option<i64>,
}

#[derive(sqlx::FromRow, Debug, PartialEq, Eq, Clone)]
pub struct ColumnRecord {
    pub id: ColumnId,
    pub table_id: TableId,
    pub name: String,
    pub data_type: String,
}

#[derive(sqlx::FromRow, Debug, PartialEq, Eq, Clone)]
pub struct CellRecord {
    pub id: CellId,
    pub table_id: TableId,
    pub column_id: ColumnId,
    pub row_number: RowNumber,
    pub row_key: Option<String>,
    pub value: Option<String>,
}

/// One (row, column) pair of a table; `column_name` and `value` are `None`
/// for a row that has no cells at all.
#[derive(sqlx::FromRow, Debug, PartialEq, Eq, Clone)]
pub struct AllTableCellsResult {
    pub row_number: RowNumber,
    pub row_key: Option<String>,
    pub column_name: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTable {
    pub name: String,
    pub collection_type: String,
    pub external_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewColumn {
    pub table_id: TableId,
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewRow {
    pub table_id: TableId,
    pub row_key: Option<String>,
    /// Initial values; every other column of the table gets an empty cell
    pub values: HashMap<ColumnId, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub table_id: TableId,
    pub row: RowSelector,
    pub values: Vec<(ColumnId, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedColumn {
    pub id: ColumnId,
    pub backfilled_cells: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedRow {
    pub id: RowId,
    pub row_number: RowNumber,
    pub cells: u64,
}

/// Wrapper for conversion of database-specific error codes into actual errors
#[derive(Debug)]
pub enum Error {
    UniqueConstraintViolation(sqlx::Error),
    FKConstraintViolation(sqlx::Error),

    // All other errors
    SqlxError(sqlx::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[async_trait]
pub trait Repository: Send + Sync + Debug {
    async fn setup(&self);

    async fn create_table(&self, table: &NewTable) -> Result<TableId, Error>;

    async fn get_table(&self, table: &TableRef) -> Result<TableRecord, Error>;

    async fn list_tables(&self) -> Result<Vec<TableRecord>, Error>;

    async fn rename_table(&self, table_id: TableId, new_name: &str) -> Result<(), Error>;

    async fn set_table_external_id(
        &self,
        table_id: TableId,
        external_id: Option<i64>,
    ) -> Result<(), Error>;

    async fn delete_table(&self, table_id: TableId) -> Result<(), Error>;

    /// Creates the column and an empty cell for every existing row of its table
    async fn create_column(&self, column: &NewColumn) -> Result<CreatedColumn, Error>;

    async fn get_column(&self, column_id: ColumnId) -> Result<ColumnRecord, Error>;

    async fn get_column_by_name(
        &self,
        table_id: TableId,
        name: &str,
    ) -> Result<ColumnRecord, Error>;

    async fn list_columns(&self, table_id: TableId) -> Result<Vec<ColumnRecord>, Error>;

    async fn rename_column(&self, column_id: ColumnId, new_name: &str)
        -> Result<(), Error>;

    async fn delete_column(&self, column_id: ColumnId) -> Result<(), Error>;

    /// Registers a row under the table's next row number, with one cell per column
    async fn create_row(&self, row: &NewRow) -> Result<CreatedRow, Error>;

    /// Removes the row and, through the cascade, every one of its cells
    async fn delete_row(&self, table_id: TableId, row: &RowSelector) -> Result<(), Error>;

    async fn get_cell(
        &self,
        table_id: TableId,
        column_id: ColumnId,
        row: &RowSelector,
    ) -> Result<CellRecord, Error>;

    /// Overwrites a set of cells of one row atomically. If any column has no cell
    /// in that row nothing is written and the missing columns are returned. A row
    /// that doesn't exist is a `RowNotFound`, even with nothing to write.
    async fn update_cells(&self, update: &CellUpdate) -> Result<Vec<ColumnId>, Error>;

    async fn set_cell_value(&self, cell_id: CellId, value: Option<&str>) -> Result<(), Error>;

    /// Writes `new_value` only if the cell still holds `expected`. Returns whether
    /// the write happened.
    async fn compare_and_set_cell_value(
        &self,
        cell_id: CellId,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool, Error>;

    async fn get_all_cells_in_table(
        &self,
        table_id: TableId,
    ) -> Result<Vec<AllTableCellsResult>, Error>;
}
