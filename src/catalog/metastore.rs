use std::sync::Arc;

use crate::catalog::repository::RepositoryStore;
use crate::catalog::{CatalogResult, CellStore, ColumnStore, TableStore};
use crate::data_types::TableRef;
use crate::repository::interface::Repository;
use crate::table::Table;

// Main entrypoint to the tables, columns and cells of the catalog. Callers only
// see the store traits, so the persistence behind them can be swapped out.
#[derive(Clone)]
pub struct Metastore {
    pub tables: Arc<dyn TableStore>,
    pub columns: Arc<dyn ColumnStore>,
    pub cells: Arc<dyn CellStore>,
}

impl Metastore {
    pub fn new_from_repository(repository: Arc<dyn Repository>, modify_retries: u32) -> Self {
        let repository_store = Arc::new(RepositoryStore {
            repository,
            modify_retries,
        });

        Self {
            tables: repository_store.clone(),
            columns: repository_store.clone(),
            cells: repository_store,
        }
    }

    /// Materializes a whole table: its definition, its columns and every row.
    pub async fn assemble_table(&self, table: &TableRef) -> CatalogResult<Table> {
        let definition = self.tables.get(table).await?;

        // Pin the rest of the lookups to the table we just resolved, in case
        // it gets renamed in the meantime
        let by_id = TableRef::ById(definition.id);
        let columns = self.columns.list(&by_id).await?;
        let cells = self.cells.list(&by_id).await?;

        Ok(Table::new(definition, columns, cells))
    }
}
