use std::str::FromStr;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::SqliteJournalMode;
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, QueryBuilder, Row, Sqlite,
};

use crate::data_types::{
    external_id_to_db, CellId, ColumnId, RowId, RowNumber, RowSelector, TableId, TableRef,
};
use crate::implement_repository;

use super::{
    default::{expect_affected, first_row, push_row_selector, RepositoryQueries},
    interface::{
        AllTableCellsResult, CellRecord, CellUpdate, ColumnRecord, CreatedColumn,
        CreatedRow, Error, NewColumn, NewRow, NewTable, Repository, Result, TableRecord,
    },
};

#[derive(Debug)]
pub struct SqliteRepository {
    pub executor: Pool<Sqlite>,
}

impl SqliteRepository {
    pub const MIGRATOR: Migrator = sqlx::migrate!("migrations/sqlite");
    pub const QUERIES: RepositoryQueries = RepositoryQueries {
        // `IS` is SQLite's NULL-safe equality
        value_matches: "value IS $3",
    };

    pub async fn try_new(
        dsn: String,
        journal_mode: SqliteJournalMode,
    ) -> std::result::Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&dsn)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(journal_mode);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let repo = Self { executor: pool };
        repo.setup().await;
        Ok(repo)
    }

    pub fn interpret_error(error: sqlx::Error) -> Error {
        if let sqlx::Error::Database(ref d) = error {
            // Reference: https://www.sqlite.org/rescode.html
            let message = d.message();

            // For some reason, sqlx doesn't return the proper errcode for FK violations,
            // even though it's calling sqlite3_extended_errcode which is meant to return full codes.
            // Unique constraint violations do return the correct code though.
            if message.contains("FOREIGN KEY constraint failed") {
                return Error::FKConstraintViolation(error);
            }
            if message.contains("UNIQUE constraint failed") {
                return Error::UniqueConstraintViolation(error);
            }
        }
        Error::SqlxError(error)
    }
}

implement_repository!(SqliteRepository);
