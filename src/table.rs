use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::{CatalogError, CatalogResult};
use crate::data_types::{ColumnDefinition, DataType, RowNumber, TableDefinition};
use crate::repository::interface::AllTableCellsResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub number: RowNumber,
    pub key: Option<String>,
    /// Column name to value. Empty cells map to an empty string; a column the
    /// row has no cell for at all is absent.
    pub values: BTreeMap<String, String>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }
}

/// A fully materialized table, ordered by row number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub definition: TableDefinition,
    pub columns: BTreeMap<String, DataType>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Builds the table out of its cells, which must be ordered by row number.
    pub fn new(
        definition: TableDefinition,
        columns: Vec<ColumnDefinition>,
        cells: Vec<AllTableCellsResult>,
    ) -> Self {
        let mut rows: Vec<Row> = Vec::new();

        for cell in cells {
            if rows.last().map(|r| r.number) != Some(cell.row_number) {
                rows.push(Row {
                    number: cell.row_number,
                    key: cell.row_key,
                    values: BTreeMap::new(),
                });
            }

            // Rows without any cells still come through once, with no column
            if let (Some(column), Some(row)) = (cell.column_name, rows.last_mut()) {
                row.values.insert(column, cell.value.unwrap_or_default());
            }
        }

        Self {
            definition,
            columns: columns
                .into_iter()
                .map(|c| (c.name, c.data_type))
                .collect(),
            rows,
        }
    }

    /// Looks a row up by its key.
    pub fn get(&self, key: &str) -> CatalogResult<&Row> {
        self.rows
            .iter()
            .find(|r| r.key.as_deref() == Some(key))
            .ok_or_else(|| CatalogError::KeyNotFound {
                key: key.to_string(),
            })
    }

    pub fn row(&self, number: RowNumber) -> Option<&Row> {
        self.rows
            .binary_search_by_key(&number, |r| r.number)
            .ok()
            .map(|i| &self.rows[i])
    }
}
