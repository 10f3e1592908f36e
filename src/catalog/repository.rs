use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::catalog::{
    normalize_name, CatalogError, CatalogResult, CellStore, ColumnStore, TableStore,
};
use crate::data_types::{
    external_id_from_db, external_id_to_db, CollectionType, ColumnDefinition, ColumnRef,
    ColumnId, DataType, ExternalId, RowNumber, RowSelector, TableDefinition, TableRef,
};
use crate::repository::interface::{
    AllTableCellsResult, CellRecord, CellUpdate, ColumnRecord, Error as RepositoryError,
    NewColumn, NewRow, NewTable, Repository, TableRecord,
};
use crate::validation::{apply_modifier, validate, ValueError};

// The native catalog implementation, backed by a SQL repository.
pub struct RepositoryStore {
    pub repository: Arc<dyn Repository>,
    pub modify_retries: u32,
}

impl From<RepositoryError> for CatalogError {
    fn from(err: RepositoryError) -> CatalogError {
        CatalogError::SqlxError(match err {
            RepositoryError::UniqueConstraintViolation(e) => e,
            RepositoryError::FKConstraintViolation(e) => e,
            RepositoryError::SqlxError(e) => e,
        })
    }
}

fn is_not_found(err: &RepositoryError) -> bool {
    matches!(err, RepositoryError::SqlxError(sqlx::Error::RowNotFound))
}

impl TryFrom<TableRecord> for TableDefinition {
    type Error = CatalogError;

    fn try_from(record: TableRecord) -> CatalogResult<Self> {
        let collection_type = CollectionType::from_str(&record.collection_type)
            .map_err(|_| CatalogError::InvalidKey {
                reason: format!(
                    "table {:?} has unknown collection type {:?}",
                    record.name, record.collection_type
                ),
            })?;

        Ok(TableDefinition {
            id: record.id,
            name: record.name,
            collection_type,
            external_id: record.external_id.map(external_id_from_db),
        })
    }
}

impl TryFrom<ColumnRecord> for ColumnDefinition {
    type Error = CatalogError;

    fn try_from(record: ColumnRecord) -> CatalogResult<Self> {
        let data_type = DataType::from_str(&record.data_type).map_err(|_| {
            CatalogError::InvalidKey {
                reason: format!(
                    "column {:?} has unknown data type {:?}",
                    record.name, record.data_type
                ),
            }
        })?;

        Ok(ColumnDefinition {
            id: record.id,
            table_id: record.table_id,
            name: record.name,
            data_type,
        })
    }
}

impl RepositoryStore {
    async fn resolve_table(&self, table: &TableRef) -> CatalogResult<TableRecord> {
        let not_found = || CatalogError::TableDoesNotExist {
            name: table.to_string(),
        };

        let table_ref = match table {
            // Names are stored normalized, so look them up that way too
            TableRef::ByName(name) => {
                TableRef::ByName(normalize_name(name).map_err(|_| not_found())?)
            }
            other => other.clone(),
        };

        self.repository
            .get_table(&table_ref)
            .await
            .map_err(|e| if is_not_found(&e) { not_found() } else { e.into() })
    }

    // Initial cell values of a new row, keyed by column id. Names go through the
    // same normalization as on creation, in sorted order, so when two names land
    // on one column the later one wins.
    async fn initial_values(
        &self,
        table: &TableRecord,
        values: &HashMap<String, String>,
    ) -> CatalogResult<HashMap<ColumnId, String>> {
        let columns: HashMap<String, ColumnDefinition> = self
            .repository
            .list_columns(table.id)
            .await?
            .into_iter()
            .map(|c| ColumnDefinition::try_from(c).map(|c| (c.name.clone(), c)))
            .collect::<CatalogResult<_>>()?;

        let mut initial_values = HashMap::new();
        for (name, value) in values.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            let column = match normalize_name(name).ok().and_then(|n| columns.get(&n)) {
                Some(column) => column,
                None => {
                    debug!(table = %table.name, column = %name, "Ignoring value for unknown column");
                    continue;
                }
            };

            if validate(column.data_type, value) {
                initial_values.insert(column.id, value.clone());
            } else {
                warn!(
                    table = %table.name,
                    column = %column.name,
                    data_type = %column.data_type,
                    %value,
                    "Value doesn't validate, leaving the cell empty"
                );
            }
        }

        Ok(initial_values)
    }

    async fn resolve_column(
        &self,
        table: &TableRecord,
        name: &str,
    ) -> CatalogResult<ColumnDefinition> {
        let not_found = || CatalogError::ColumnDoesNotExist {
            name: name.to_string(),
        };
        let normalized = normalize_name(name).map_err(|_| not_found())?;

        self.repository
            .get_column_by_name(table.id, &normalized)
            .await
            .map_err(|e| if is_not_found(&e) { not_found() } else { e.into() })?
            .try_into()
    }

    async fn resolve_column_ref(
        &self,
        column: &ColumnRef,
    ) -> CatalogResult<ColumnDefinition> {
        match column {
            ColumnRef::ById(id) => self
                .repository
                .get_column(*id)
                .await
                .map_err(|e| {
                    if is_not_found(&e) {
                        CatalogError::ColumnDoesNotExist {
                            name: column.to_string(),
                        }
                    } else {
                        e.into()
                    }
                })?
                .try_into(),
            ColumnRef::ByName(table, name) => {
                let table = self.resolve_table(table).await?;
                self.resolve_column(&table, name).await
            }
        }
    }

    async fn resolve_cell(
        &self,
        table: &TableRef,
        column: &str,
        row: &RowSelector,
    ) -> CatalogResult<(ColumnDefinition, CellRecord)> {
        let table = self.resolve_table(table).await?;
        let column = self.resolve_column(&table, column).await?;
        let cell = self.get_cell(&column, row).await?;

        Ok((column, cell))
    }

    async fn get_cell(
        &self,
        column: &ColumnDefinition,
        row: &RowSelector,
    ) -> CatalogResult<CellRecord> {
        self.repository
            .get_cell(column.table_id, column.id, row)
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    CatalogError::CellDoesNotExist {
                        column: column.name.clone(),
                        row: row.to_string(),
                    }
                } else {
                    e.into()
                }
            })
    }
}

fn invalid_data(column: &ColumnDefinition, error: ValueError) -> CatalogError {
    CatalogError::InvalidData {
        column: column.name.clone(),
        reason: error.to_string(),
    }
}

#[async_trait]
impl TableStore for RepositoryStore {
    async fn create(
        &self,
        name: &str,
        collection_type: CollectionType,
        external_id: Option<ExternalId>,
    ) -> CatalogResult<TableDefinition> {
        let name = normalize_name(name)?;

        let id = self
            .repository
            .create_table(&NewTable {
                name: name.clone(),
                collection_type: collection_type.to_string(),
                external_id: external_id.map(external_id_to_db),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(_) => {
                    CatalogError::TableAlreadyExists { name: name.clone() }
                }
                e => e.into(),
            })?;

        info!(table_id = id, %name, %collection_type, ?external_id, "Created table");

        Ok(TableDefinition {
            id,
            name,
            collection_type,
            external_id,
        })
    }

    async fn get(&self, table: &TableRef) -> CatalogResult<TableDefinition> {
        self.resolve_table(table).await?.try_into()
    }

    async fn list(&self) -> CatalogResult<Vec<TableDefinition>> {
        self.repository
            .list_tables()
            .await?
            .into_iter()
            .map(TableDefinition::try_from)
            .collect()
    }

    async fn rename(
        &self,
        table: &TableRef,
        new_name: &str,
    ) -> CatalogResult<TableDefinition> {
        let record = self.resolve_table(table).await?;
        let new_name = normalize_name(new_name)?;

        self.repository
            .rename_table(record.id, &new_name)
            .await
            .map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(_) => {
                    CatalogError::TableAlreadyExists {
                        name: new_name.clone(),
                    }
                }
                RepositoryError::SqlxError(sqlx::Error::RowNotFound) => {
                    CatalogError::TableDoesNotExist {
                        name: table.to_string(),
                    }
                }
                e => e.into(),
            })?;

        info!(table_id = record.id, old_name = %record.name, %new_name, "Renamed table");

        TableDefinition::try_from(TableRecord {
            name: new_name,
            ..record
        })
    }

    async fn set_external_id(
        &self,
        table: &TableRef,
        external_id: Option<ExternalId>,
    ) -> CatalogResult<TableDefinition> {
        let record = self.resolve_table(table).await?;
        let db_external_id = external_id.map(external_id_to_db);

        self.repository
            .set_table_external_id(record.id, db_external_id)
            .await
            .map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(_) => {
                    CatalogError::TableAlreadyExists {
                        name: external_id
                            .map(|id| TableRef::ByExternalId(id).to_string())
                            .unwrap_or_default(),
                    }
                }
                RepositoryError::SqlxError(sqlx::Error::RowNotFound) => {
                    CatalogError::TableDoesNotExist {
                        name: table.to_string(),
                    }
                }
                e => e.into(),
            })?;

        info!(table_id = record.id, ?external_id, "Set table external id");

        TableDefinition::try_from(TableRecord {
            external_id: db_external_id,
            ..record
        })
    }

    async fn delete(&self, table: &TableRef) -> CatalogResult<()> {
        let record = self.resolve_table(table).await?;

        self.repository
            .delete_table(record.id)
            .await
            .map_err(|e| match e {
                RepositoryError::SqlxError(sqlx::Error::RowNotFound) => {
                    CatalogError::TableDoesNotExist {
                        name: table.to_string(),
                    }
                }
                e => e.into(),
            })?;

        info!(table_id = record.id, name = %record.name, "Deleted table");
        Ok(())
    }
}

#[async_trait]
impl ColumnStore for RepositoryStore {
    async fn create(
        &self,
        table: &TableRef,
        name: &str,
        data_type: DataType,
    ) -> CatalogResult<ColumnDefinition> {
        let table_record = self.resolve_table(table).await?;
        let name = normalize_name(name)?;

        let created = self
            .repository
            .create_column(&NewColumn {
                table_id: table_record.id,
                name: name.clone(),
                data_type: data_type.to_string(),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(_) => {
                    CatalogError::ColumnAlreadyExists { name: name.clone() }
                }
                // The table went away between resolving it and adding the column
                RepositoryError::FKConstraintViolation(_)
                | RepositoryError::SqlxError(sqlx::Error::RowNotFound) => {
                    CatalogError::TableDoesNotExist {
                        name: table.to_string(),
                    }
                }
                e => e.into(),
            })?;

        info!(
            table_id = table_record.id,
            column_id = created.id,
            %name,
            %data_type,
            backfilled_cells = created.backfilled_cells,
            "Created column"
        );

        Ok(ColumnDefinition {
            id: created.id,
            table_id: table_record.id,
            name,
            data_type,
        })
    }

    async fn get(&self, column: &ColumnRef) -> CatalogResult<ColumnDefinition> {
        self.resolve_column_ref(column).await
    }

    async fn list(&self, table: &TableRef) -> CatalogResult<Vec<ColumnDefinition>> {
        let table = self.resolve_table(table).await?;

        self.repository
            .list_columns(table.id)
            .await?
            .into_iter()
            .map(ColumnDefinition::try_from)
            .collect()
    }

    async fn rename(
        &self,
        column: &ColumnRef,
        new_name: &str,
    ) -> CatalogResult<ColumnDefinition> {
        let definition = self.resolve_column_ref(column).await?;
        let new_name = normalize_name(new_name)?;

        self.repository
            .rename_column(definition.id, &new_name)
            .await
            .map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(_) => {
                    CatalogError::ColumnAlreadyExists {
                        name: new_name.clone(),
                    }
                }
                RepositoryError::SqlxError(sqlx::Error::RowNotFound) => {
                    CatalogError::ColumnDoesNotExist {
                        name: column.to_string(),
                    }
                }
                e => e.into(),
            })?;

        info!(
            column_id = definition.id,
            old_name = %definition.name,
            %new_name,
            "Renamed column"
        );

        Ok(ColumnDefinition {
            name: new_name,
            ..definition
        })
    }

    async fn delete(&self, column: &ColumnRef) -> CatalogResult<()> {
        let definition = self.resolve_column_ref(column).await?;

        self.repository
            .delete_column(definition.id)
            .await
            .map_err(|e| match e {
                RepositoryError::SqlxError(sqlx::Error::RowNotFound) => {
                    CatalogError::ColumnDoesNotExist {
                        name: column.to_string(),
                    }
                }
                e => e.into(),
            })?;

        info!(column_id = definition.id, name = %definition.name, "Deleted column");
        Ok(())
    }
}

#[async_trait]
impl CellStore for RepositoryStore {
    async fn add_row(
        &self,
        table: &TableRef,
        key: Option<&str>,
        values: &HashMap<String, String>,
    ) -> CatalogResult<RowNumber> {
        let table_record = self.resolve_table(table).await?;
        let mut retried = false;

        let created = loop {
            let new_row = NewRow {
                table_id: table_record.id,
                row_key: key.map(str::to_string),
                values: self.initial_values(&table_record, values).await?,
            };

            match self.repository.create_row(&new_row).await {
                Ok(created) => break created,
                // A column was dropped between reading the schema and writing its
                // cell; the next attempt sees the new schema
                Err(RepositoryError::FKConstraintViolation(_)) if !retried => {
                    debug!(table_id = table_record.id, "Columns changed while adding a row, retrying");
                    retried = true;
                }
                Err(RepositoryError::UniqueConstraintViolation(_)) => {
                    return Err(CatalogError::KeyAlreadyPresentInTable {
                        key: key.unwrap_or_default().to_string(),
                        table: table_record.name,
                    })
                }
                Err(e) if is_not_found(&e) => {
                    return Err(CatalogError::TableDoesNotExist {
                        name: table.to_string(),
                    })
                }
                Err(e) => return Err(e.into()),
            }
        };

        debug!(
            table_id = table_record.id,
            row_number = created.row_number,
            ?key,
            cells = created.cells,
            "Added row"
        );

        Ok(created.row_number)
    }

    async fn delete_row(&self, table: &TableRef, row: &RowSelector) -> CatalogResult<()> {
        let table_record = self.resolve_table(table).await?;

        self.repository
            .delete_row(table_record.id, row)
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    CatalogError::InvalidKey {
                        reason: format!(
                            "{row} doesn't exist in table {:?}",
                            table_record.name
                        ),
                    }
                } else {
                    e.into()
                }
            })?;

        debug!(table_id = table_record.id, %row, "Deleted row");
        Ok(())
    }

    async fn update_row(
        &self,
        table: &TableRef,
        row: &RowSelector,
        values: &HashMap<String, String>,
    ) -> CatalogResult<()> {
        let table_record = self.resolve_table(table).await?;

        // Check everything up front, in a stable order so the reported column
        // doesn't depend on hashing
        let mut update = Vec::with_capacity(values.len());
        let mut names = HashMap::new();
        for (name, value) in values.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            let column = self.resolve_column(&table_record, name).await?;
            if !validate(column.data_type, value) {
                return Err(invalid_data(
                    &column,
                    ValueError::Invalid {
                        data_type: column.data_type,
                        value: value.clone(),
                    },
                ));
            }
            update.push((column.id, value.clone()));
            names.insert(column.id, column.name);
        }

        // A missing row is reported against the first column that was asked for
        let first_column = update
            .first()
            .and_then(|(id, _)| names.get(id).cloned())
            .unwrap_or_default();

        let missing = self
            .repository
            .update_cells(&CellUpdate {
                table_id: table_record.id,
                row: row.clone(),
                values: update,
            })
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    CatalogError::CellDoesNotExist {
                        column: first_column,
                        row: row.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;

        if let Some(column_id) = missing.first() {
            return Err(CatalogError::CellDoesNotExist {
                column: names.remove(column_id).unwrap_or_default(),
                row: row.to_string(),
            });
        }

        debug!(table_id = table_record.id, %row, columns = values.len(), "Updated row");
        Ok(())
    }

    async fn get_value(
        &self,
        table: &TableRef,
        column: &str,
        row: &RowSelector,
    ) -> CatalogResult<(Option<String>, DataType)> {
        let (column, cell) = self.resolve_cell(table, column, row).await?;
        Ok((cell.value, column.data_type))
    }

    async fn set_value(
        &self,
        table: &TableRef,
        column: &str,
        row: &RowSelector,
        value: &str,
    ) -> CatalogResult<()> {
        let (column, cell) = self.resolve_cell(table, column, row).await?;

        if !validate(column.data_type, value) {
            return Err(invalid_data(
                &column,
                ValueError::Invalid {
                    data_type: column.data_type,
                    value: value.to_string(),
                },
            ));
        }

        self.repository
            .set_cell_value(cell.id, Some(value))
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    CatalogError::CellDoesNotExist {
                        column: column.name.clone(),
                        row: row.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;

        debug!(cell_id = cell.id, column = %column.name, %row, %value, "Set value");
        Ok(())
    }

    async fn modify_value(
        &self,
        table: &TableRef,
        column: &str,
        row: &RowSelector,
        modifier: &str,
    ) -> CatalogResult<String> {
        let (column, mut cell) = self.resolve_cell(table, column, row).await?;
        let attempts = self.modify_retries.max(1);

        for attempt in 1..=attempts {
            let new_value = apply_modifier(column.data_type, cell.value.as_deref(), modifier)
                .map_err(|e| invalid_data(&column, e))?;

            if self
                .repository
                .compare_and_set_cell_value(cell.id, cell.value.as_deref(), &new_value)
                .await?
            {
                debug!(
                    cell_id = cell.id,
                    column = %column.name,
                    %row,
                    old_value = ?cell.value,
                    %new_value,
                    "Modified value"
                );
                return Ok(new_value);
            }

            debug!(cell_id = cell.id, attempt, "Cell changed under us, retrying modify");
            // Also notices the row having been deleted in the meantime
            cell = self.get_cell(&column, row).await?;
        }

        warn!(
            column = %column.name,
            %row,
            attempts,
            "Giving up on a contended modify"
        );
        Err(CatalogError::ConcurrentModification {
            column: column.name,
            row: row.to_string(),
            attempts,
        })
    }

    async fn list(&self, table: &TableRef) -> CatalogResult<Vec<AllTableCellsResult>> {
        let table = self.resolve_table(table).await?;
        Ok(self.repository.get_all_cells_in_table(table.id).await?)
    }
}
