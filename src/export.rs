//! Plain-text CSV rendering of an assembled table.
//!
//! The header is `ID,Key` followed by the column names in name order; each row
//! is its number, its key (empty if it has none) and its values. Fields are
//! written as-is, without any quoting or escaping.
use std::iter;

use itertools::Itertools;

use crate::catalog::{CatalogError, CatalogResult};
use crate::table::Table;

pub fn to_csv(table: &Table) -> CatalogResult<String> {
    if let Some((name, data_type)) = table.columns.iter().find(|(_, t)| t.is_list()) {
        return Err(CatalogError::NotImplemented {
            reason: format!("exporting column {name:?} of list type {data_type} to CSV"),
        });
    }

    let mut csv = iter::once("ID")
        .chain(iter::once("Key"))
        .chain(table.columns.keys().map(String::as_str))
        .join(",");
    csv.push('\n');

    for row in &table.rows {
        let line = iter::once(row.number.to_string())
            .chain(iter::once(row.key.clone().unwrap_or_default()))
            .chain(
                table
                    .columns
                    .keys()
                    .map(|column| row.get(column).unwrap_or_default().to_string()),
            )
            .join(",");
        csv.push_str(&line);
        csv.push('\n');
    }

    Ok(csv)
}
