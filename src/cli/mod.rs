pub mod commands;

use std::collections::HashMap;

use crate::catalog::metastore::Metastore;
use crate::catalog::CatalogError;
use crate::data_types::ColumnRef;
use crate::export::to_csv;
use commands::{CellCommand, ColumnCommand, Command, RowCommand, TableCommand};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Error serializing output: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct TabulaCli {
    metastore: Metastore,
}

impl TabulaCli {
    pub fn new(metastore: Metastore) -> Self {
        TabulaCli { metastore }
    }

    // Run a single command, returning what should be printed on stdout
    pub async fn handle_command(&self, cmd: Command) -> Result<String, CliError> {
        match cmd {
            Command::Table(cmd) => self.handle_table_command(cmd).await,
            Command::Column(cmd) => self.handle_column_command(cmd).await,
            Command::Row(cmd) => self.handle_row_command(cmd).await,
            Command::Cell(cmd) => self.handle_cell_command(cmd).await,
        }
    }

    async fn handle_table_command(&self, cmd: TableCommand) -> Result<String, CliError> {
        let tables = &self.metastore.tables;

        Ok(match cmd {
            TableCommand::Create {
                name,
                collection_type,
                external_id,
            } => {
                let table = tables.create(&name, collection_type, external_id).await?;
                serde_json::to_string(&table)?
            }
            TableCommand::Delete { table } => {
                tables.delete(&table).await?;
                String::new()
            }
            TableCommand::Rename { table, new_name } => {
                serde_json::to_string(&tables.rename(&table, &new_name).await?)?
            }
            TableCommand::SetExternalId { table, external_id } => serde_json::to_string(
                &tables.set_external_id(&table, external_id).await?,
            )?,
            TableCommand::List => serde_json::to_string_pretty(&tables.list().await?)?,
            TableCommand::Show { table } => {
                serde_json::to_string_pretty(&self.metastore.assemble_table(&table).await?)?
            }
            TableCommand::Export { table } => {
                to_csv(&self.metastore.assemble_table(&table).await?)?
            }
        })
    }

    async fn handle_column_command(&self, cmd: ColumnCommand) -> Result<String, CliError> {
        let columns = &self.metastore.columns;

        Ok(match cmd {
            ColumnCommand::Create {
                table,
                name,
                data_type,
            } => serde_json::to_string(&columns.create(&table, &name, data_type).await?)?,
            ColumnCommand::Delete { table, name } => {
                columns.delete(&ColumnRef::ByName(table, name)).await?;
                String::new()
            }
            ColumnCommand::Rename {
                table,
                name,
                new_name,
            } => serde_json::to_string(
                &columns
                    .rename(&ColumnRef::ByName(table, name), &new_name)
                    .await?,
            )?,
            ColumnCommand::List { table } => {
                serde_json::to_string_pretty(&columns.list(&table).await?)?
            }
        })
    }

    async fn handle_row_command(&self, cmd: RowCommand) -> Result<String, CliError> {
        let cells = &self.metastore.cells;

        Ok(match cmd {
            RowCommand::Add { table, key, values } => {
                let values: HashMap<String, String> = values.into_iter().collect();
                cells
                    .add_row(&table, key.as_deref(), &values)
                    .await?
                    .to_string()
            }
            RowCommand::Delete { table, row } => {
                cells.delete_row(&table, &row.selector()).await?;
                String::new()
            }
            RowCommand::Update { table, row, values } => {
                let values: HashMap<String, String> = values.into_iter().collect();
                cells.update_row(&table, &row.selector(), &values).await?;
                String::new()
            }
        })
    }

    async fn handle_cell_command(&self, cmd: CellCommand) -> Result<String, CliError> {
        let cells = &self.metastore.cells;

        Ok(match cmd {
            CellCommand::Get { table, column, row } => {
                let (value, _) = cells.get_value(&table, &column, &row.selector()).await?;
                value.unwrap_or_default()
            }
            CellCommand::Set {
                table,
                column,
                row,
                value,
            } => {
                cells
                    .set_value(&table, &column, &row.selector(), &value)
                    .await?;
                String::new()
            }
            CellCommand::Modify {
                table,
                column,
                row,
                modifier,
            } => {
                cells
                    .modify_value(&table, &column, &row.selector(), &modifier)
                    .await?
            }
        })
    }
}
