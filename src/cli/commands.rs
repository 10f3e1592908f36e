use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::data_types::{
    CollectionType, DataType, ExternalId, RowNumber, RowSelector, TableRef,
};

/// Runtime-defined tables with typed columns and keyed rows
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML config file; `TABULA__*` environment variables override it
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[clap(long)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create, inspect and export tables
    #[clap(subcommand)]
    Table(TableCommand),
    /// Manage the columns of a table
    #[clap(subcommand)]
    Column(ColumnCommand),
    /// Add, remove and update rows
    #[clap(subcommand)]
    Row(RowCommand),
    /// Read and write single cells
    #[clap(subcommand)]
    Cell(CellCommand),
}

// Tables are given as `id:<n>`, `ext:<n>` or a name
#[derive(Subcommand, Debug)]
pub enum TableCommand {
    Create {
        name: String,
        #[clap(long, default_value = "per-key")]
        collection_type: CollectionType,
        #[clap(long)]
        external_id: Option<ExternalId>,
    },
    Delete {
        table: TableRef,
    },
    Rename {
        table: TableRef,
        new_name: String,
    },
    /// Set the external id of a table, or clear it if none is given
    SetExternalId {
        table: TableRef,
        external_id: Option<ExternalId>,
    },
    List,
    /// Print the whole table as JSON
    Show {
        table: TableRef,
    },
    /// Print the whole table as CSV
    Export {
        table: TableRef,
    },
}

#[derive(Subcommand, Debug)]
pub enum ColumnCommand {
    Create {
        table: TableRef,
        name: String,
        data_type: DataType,
    },
    Delete {
        table: TableRef,
        name: String,
    },
    Rename {
        table: TableRef,
        name: String,
        new_name: String,
    },
    List {
        table: TableRef,
    },
}

#[derive(Subcommand, Debug)]
pub enum RowCommand {
    /// Add a row and print its number
    Add {
        table: TableRef,
        #[clap(long)]
        key: Option<String>,
        /// Initial value, as `column=value`; may be repeated
        #[clap(long = "value", parse(try_from_str = parse_assignment))]
        values: Vec<(String, String)>,
    },
    Delete {
        table: TableRef,
        #[clap(flatten)]
        row: RowArgs,
    },
    /// Overwrite several cells of a row at once
    Update {
        table: TableRef,
        #[clap(flatten)]
        row: RowArgs,
        #[clap(long = "value", required = true, parse(try_from_str = parse_assignment))]
        values: Vec<(String, String)>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CellCommand {
    Get {
        table: TableRef,
        column: String,
        #[clap(flatten)]
        row: RowArgs,
    },
    Set {
        table: TableRef,
        column: String,
        #[clap(flatten)]
        row: RowArgs,
        value: String,
    },
    /// Add to a numeric cell, or overwrite any other cell; prints the new value
    #[clap(allow_negative_numbers = true)]
    Modify {
        table: TableRef,
        column: String,
        #[clap(flatten)]
        row: RowArgs,
        #[clap(allow_hyphen_values = true)]
        modifier: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct RowArgs {
    /// Row number
    #[clap(long, conflicts_with = "key", required_unless_present = "key")]
    pub number: Option<RowNumber>,

    /// Row key
    #[clap(long)]
    pub key: Option<String>,
}

impl RowArgs {
    pub fn selector(&self) -> RowSelector {
        match (self.number, &self.key) {
            (Some(number), _) => RowSelector::Number(number),
            (None, Some(key)) => RowSelector::Key(key.clone()),
            (None, None) => unreachable!("clap requires either --number or --key"),
        }
    }
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(column, value)| (column.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected `column=value`, got {s:?}"))
}
