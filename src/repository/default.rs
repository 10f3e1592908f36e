//! Default implementation for a Repository that factors out common
//! query patterns / SQL queries between Postgres and SQLite.
//!
//! Usage:
//!
//! The struct has to have certain fields, since this macro relies on them:
//!
//! ```ignore
//! pub struct MyRepository {
//!     pub executor: sqlx::Pool<sqlx::SqlxDatabaseType>
//! }
//!
//! impl MyRepository {
//!     pub const MIGRATOR: sqlx::Migrator = sqlx::migrate!("my/migrations");
//!     pub const QUERIES: RepositoryQueries = RepositoryQueries {
//!         value_matches: "value IS $3",
//!     }
//!     pub fn interpret_error(error: sqlx::Error) -> Error {
//!         // Interpret the database-specific error code and turn some sqlx errors
//!         // into the Error enum values like UniqueConstraintViolation/FKConstraintViolation
//!         // ...
//!     }
//! }
//!
//! implement_repository!(SqliteRepository)
//! ```
//!
//! The SQL is shared textually rather than through a `Pool<Any>` or a generic
//! implementation: both run into sqlx borrow checker issues with `QueryBuilder`
//! (https://github.com/launchbadge/sqlx/issues/1978), and a macro keeps the two
//! backends from drifting apart. The price is that there's no compile-time query
//! checking.
//!
//! Writes always run their statement to completion (`execute` or `fetch_all`).
//! SQLite only finishes a statement once it's stepped past its last row, and
//! until then a write stays invisible to the pool's other connections.
//!
//! Every multi-statement operation runs in its own transaction. Row and column
//! creation both start by writing to the owning "table" record, which makes that
//! record a per-table serialization point: a column backfill can't miss a row
//! that's being added concurrently, and vice versa.

use sqlx::{Database, Encode, QueryBuilder, Type};

use crate::data_types::RowSelector;

/// Queries that are different between SQLite and PG
pub struct RepositoryQueries {
    /// NULL-safe equality between the `value` column and the third bind parameter
    pub value_matches: &'static str,
}

/// Fails with `RowNotFound` when a write matched nothing, mirroring what
/// `fetch_one` would do on a read
pub fn expect_affected(rows_affected: u64) -> Result<(), sqlx::Error> {
    if rows_affected == 0 {
        Err(sqlx::Error::RowNotFound)
    } else {
        Ok(())
    }
}

/// The first row of a fully drained `RETURNING` result
pub fn first_row<R>(rows: Vec<R>) -> Result<R, sqlx::Error> {
    rows.into_iter().next().ok_or(sqlx::Error::RowNotFound)
}

/// Narrows a query on `table_row` or `cell` down to the selected row
pub fn push_row_selector<'a, DB: Database>(
    builder: &mut QueryBuilder<'a, DB>,
    row: &'a RowSelector,
) where
    i64: Encode<'a, DB> + Type<DB>,
    &'a str: Encode<'a, DB> + Type<DB>,
{
    match row {
        RowSelector::Number(number) => {
            builder.push(" AND row_number = ");
            builder.push_bind(*number);
        }
        RowSelector::Key(key) => {
            builder.push(" AND row_key = ");
            builder.push_bind(key.as_str());
        }
    }
}

#[macro_export]
macro_rules! implement_repository {
    ($repo: ident) => {
#[async_trait]
impl Repository for $repo {
    async fn setup(&self) {
        $repo::MIGRATOR
            .run(&self.executor)
            .await
            .expect("error running migrations");
    }

    async fn create_table(&self, table: &NewTable) -> Result<TableId, Error> {
        let rows = sqlx::query(
            r#"INSERT INTO "table" (name, collection_type, external_id) VALUES ($1, $2, $3) RETURNING id"#,
        )
        .bind(&table.name)
        .bind(&table.collection_type)
        .bind(table.external_id)
        .fetch_all(&self.executor)
        .await.map_err($repo::interpret_error)?;

        let id = first_row(rows)
            .and_then(|row| row.try_get("id"))
            .map_err($repo::interpret_error)?;

        Ok(id)
    }

    async fn get_table(&self, table: &TableRef) -> Result<TableRecord, Error> {
        let mut builder: QueryBuilder<_> = QueryBuilder::new(
            r#"SELECT id, name, collection_type, external_id FROM "table" WHERE "#,
        );

        match table {
            TableRef::ById(id) => builder.push("id = ").push_bind(*id),
            TableRef::ByName(name) => builder.push("name = ").push_bind(name.as_str()),
            TableRef::ByExternalId(id) => builder
                .push("external_id = ")
                .push_bind(external_id_to_db(*id)),
        };

        let record = builder
            .build_query_as()
            .fetch_one(&self.executor)
            .await
            .map_err($repo::interpret_error)?;

        Ok(record)
    }

    async fn list_tables(&self) -> Result<Vec<TableRecord>, Error> {
        let tables = sqlx::query_as(
            r#"SELECT id, name, collection_type, external_id FROM "table" ORDER BY name"#,
        )
        .fetch(&self.executor)
        .try_collect()
        .await
        .map_err($repo::interpret_error)?;

        Ok(tables)
    }

    // In the update/delete methods, check the affected row count so that we get an
    // error if the table/column/row didn't actually exist

    async fn rename_table(&self, table_id: TableId, new_name: &str) -> Result<(), Error> {
        let result = sqlx::query(r#"UPDATE "table" SET name = $1 WHERE id = $2"#)
            .bind(new_name)
            .bind(table_id)
            .execute(&self.executor)
            .await.map_err($repo::interpret_error)?;

        expect_affected(result.rows_affected()).map_err($repo::interpret_error)
    }

    async fn set_table_external_id(
        &self,
        table_id: TableId,
        external_id: Option<i64>,
    ) -> Result<(), Error> {
        let result = sqlx::query(r#"UPDATE "table" SET external_id = $1 WHERE id = $2"#)
            .bind(external_id)
            .bind(table_id)
            .execute(&self.executor)
            .await.map_err($repo::interpret_error)?;

        expect_affected(result.rows_affected()).map_err($repo::interpret_error)
    }

    async fn delete_table(&self, table_id: TableId) -> Result<(), Error> {
        let result = sqlx::query(r#"DELETE FROM "table" WHERE id = $1"#)
            .bind(table_id)
            .execute(&self.executor)
            .await.map_err($repo::interpret_error)?;

        expect_affected(result.rows_affected()).map_err($repo::interpret_error)
    }

    async fn create_column(&self, column: &NewColumn) -> Result<CreatedColumn, Error> {
        let mut tx = self.executor.begin().await.map_err($repo::interpret_error)?;

        // Lock the table record; this also makes a missing table a RowNotFound
        let locked = sqlx::query(r#"UPDATE "table" SET next_row_number = next_row_number WHERE id = $1"#)
            .bind(column.table_id)
            .execute(&mut *tx)
            .await.map_err($repo::interpret_error)?;
        expect_affected(locked.rows_affected()).map_err($repo::interpret_error)?;

        let rows = sqlx::query(
            "INSERT INTO table_column (table_id, name, data_type) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(column.table_id)
        .bind(&column.name)
        .bind(&column.data_type)
        .fetch_all(&mut *tx)
        .await.map_err($repo::interpret_error)?;

        let id: ColumnId = first_row(rows)
            .and_then(|row| row.try_get("id"))
            .map_err($repo::interpret_error)?;

        // One empty cell for every row the table already has
        let backfilled_cells = sqlx::query(
            "INSERT INTO cell (table_id, column_id, row_id, row_number, row_key, value)
            SELECT table_id, CAST($1 AS BIGINT), id, row_number, row_key, NULL
            FROM table_row WHERE table_id = $2",
        )
        .bind(id)
        .bind(column.table_id)
        .execute(&mut *tx)
        .await.map_err($repo::interpret_error)?
        .rows_affected();

        tx.commit().await.map_err($repo::interpret_error)?;

        Ok(CreatedColumn { id, backfilled_cells })
    }

    async fn get_column(&self, column_id: ColumnId) -> Result<ColumnRecord, Error> {
        let column = sqlx::query_as(
            "SELECT id, table_id, name, data_type FROM table_column WHERE id = $1",
        )
        .bind(column_id)
        .fetch_one(&self.executor)
        .await.map_err($repo::interpret_error)?;

        Ok(column)
    }

    async fn get_column_by_name(
        &self,
        table_id: TableId,
        name: &str,
    ) -> Result<ColumnRecord, Error> {
        let column = sqlx::query_as(
            "SELECT id, table_id, name, data_type FROM table_column WHERE table_id = $1 AND name = $2",
        )
        .bind(table_id)
        .bind(name)
        .fetch_one(&self.executor)
        .await.map_err($repo::interpret_error)?;

        Ok(column)
    }

    async fn list_columns(&self, table_id: TableId) -> Result<Vec<ColumnRecord>, Error> {
        let columns = sqlx::query_as(
            "SELECT id, table_id, name, data_type FROM table_column WHERE table_id = $1 ORDER BY name",
        )
        .bind(table_id)
        .fetch(&self.executor)
        .try_collect()
        .await
        .map_err($repo::interpret_error)?;

        Ok(columns)
    }

    async fn rename_column(&self, column_id: ColumnId, new_name: &str) -> Result<(), Error> {
        let result = sqlx::query("UPDATE table_column SET name = $1 WHERE id = $2")
            .bind(new_name)
            .bind(column_id)
            .execute(&self.executor)
            .await.map_err($repo::interpret_error)?;

        expect_affected(result.rows_affected()).map_err($repo::interpret_error)
    }

    async fn delete_column(&self, column_id: ColumnId) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM table_column WHERE id = $1")
            .bind(column_id)
            .execute(&self.executor)
            .await.map_err($repo::interpret_error)?;

        expect_affected(result.rows_affected()).map_err($repo::interpret_error)
    }

    async fn create_row(&self, row: &NewRow) -> Result<CreatedRow, Error> {
        let mut tx = self.executor.begin().await.map_err($repo::interpret_error)?;

        // Take the next number off the table's counter; numbers are never handed out twice
        let rows = sqlx::query(
            r#"UPDATE "table" SET next_row_number = next_row_number + 1 WHERE id = $1
            RETURNING next_row_number - 1 AS row_number"#,
        )
        .bind(row.table_id)
        .fetch_all(&mut *tx)
        .await.map_err($repo::interpret_error)?;

        let row_number: RowNumber = first_row(rows)
            .and_then(|r| r.try_get("row_number"))
            .map_err($repo::interpret_error)?;

        let rows = sqlx::query(
            "INSERT INTO table_row (table_id, row_number, row_key) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(row.table_id)
        .bind(row_number)
        .bind(row.row_key.as_deref())
        .fetch_all(&mut *tx)
        .await.map_err($repo::interpret_error)?;

        let id: RowId = first_row(rows)
            .and_then(|r| r.try_get("id"))
            .map_err($repo::interpret_error)?;

        let cells = sqlx::query(
            "INSERT INTO cell (table_id, column_id, row_id, row_number, row_key, value)
            SELECT table_id, id, CAST($1 AS BIGINT), CAST($2 AS BIGINT), $3, NULL
            FROM table_column WHERE table_id = $4",
        )
        .bind(id)
        .bind(row_number)
        .bind(row.row_key.as_deref())
        .bind(row.table_id)
        .execute(&mut *tx)
        .await.map_err($repo::interpret_error)?
        .rows_affected();

        for (column_id, value) in row.values.iter() {
            sqlx::query("UPDATE cell SET value = $1 WHERE row_id = $2 AND column_id = $3")
                .bind(value)
                .bind(id)
                .bind(column_id)
                .execute(&mut *tx)
                .await.map_err($repo::interpret_error)?;
        }

        tx.commit().await.map_err($repo::interpret_error)?;

        Ok(CreatedRow { id, row_number, cells })
    }

    async fn delete_row(&self, table_id: TableId, row: &RowSelector) -> Result<(), Error> {
        let mut builder: QueryBuilder<_> =
            QueryBuilder::new("DELETE FROM table_row WHERE table_id = ");
        builder.push_bind(table_id);
        push_row_selector(&mut builder, row);

        let result = builder
            .build()
            .execute(&self.executor)
            .await.map_err($repo::interpret_error)?;

        expect_affected(result.rows_affected()).map_err($repo::interpret_error)
    }

    async fn get_cell(
        &self,
        table_id: TableId,
        column_id: ColumnId,
        row: &RowSelector,
    ) -> Result<CellRecord, Error> {
        let mut builder: QueryBuilder<_> = QueryBuilder::new(
            "SELECT id, table_id, column_id, row_number, row_key, value FROM cell WHERE table_id = ",
        );
        builder.push_bind(table_id);
        builder.push(" AND column_id = ");
        builder.push_bind(column_id);
        push_row_selector(&mut builder, row);

        let cell = builder
            .build_query_as()
            .fetch_one(&self.executor)
            .await
            .map_err($repo::interpret_error)?;

        Ok(cell)
    }

    async fn update_cells(&self, update: &CellUpdate) -> Result<Vec<ColumnId>, Error> {
        let mut tx = self.executor.begin().await.map_err($repo::interpret_error)?;

        let mut builder: QueryBuilder<_> =
            QueryBuilder::new("SELECT id FROM table_row WHERE table_id = ");
        builder.push_bind(update.table_id);
        push_row_selector(&mut builder, &update.row);
        let rows = builder
            .build()
            .fetch_all(&mut *tx)
            .await
            .map_err($repo::interpret_error)?;
        if rows.is_empty() {
            tx.rollback().await.map_err($repo::interpret_error)?;
            return Err(Error::SqlxError(sqlx::Error::RowNotFound));
        }

        let mut missing = vec![];

        for (column_id, value) in update.values.iter() {
            let mut builder: QueryBuilder<_> = QueryBuilder::new("UPDATE cell SET value = ");
            builder.push_bind(value.as_str());
            builder.push(" WHERE table_id = ");
            builder.push_bind(update.table_id);
            builder.push(" AND column_id = ");
            builder.push_bind(*column_id);
            push_row_selector(&mut builder, &update.row);

            let updated = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err($repo::interpret_error)?;

            if updated.rows_affected() == 0 {
                missing.push(*column_id);
            }
        }

        if missing.is_empty() {
            tx.commit().await.map_err($repo::interpret_error)?;
        } else {
            tx.rollback().await.map_err($repo::interpret_error)?;
        }

        Ok(missing)
    }

    async fn set_cell_value(&self, cell_id: CellId, value: Option<&str>) -> Result<(), Error> {
        let result = sqlx::query("UPDATE cell SET value = $1 WHERE id = $2")
            .bind(value)
            .bind(cell_id)
            .execute(&self.executor)
            .await.map_err($repo::interpret_error)?;

        expect_affected(result.rows_affected()).map_err($repo::interpret_error)
    }

    async fn compare_and_set_cell_value(
        &self,
        cell_id: CellId,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool, Error> {
        let query = format!(
            "UPDATE cell SET value = $1 WHERE id = $2 AND {}",
            $repo::QUERIES.value_matches
        );

        let result = sqlx::query(&query)
            .bind(new_value)
            .bind(cell_id)
            .bind(expected)
            .execute(&self.executor)
            .await.map_err($repo::interpret_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_all_cells_in_table(
        &self,
        table_id: TableId,
    ) -> Result<Vec<AllTableCellsResult>, Error> {
        let cells = sqlx::query_as(
            r#"
        SELECT
            table_row.row_number AS row_number,
            table_row.row_key AS row_key,
            table_column.name AS column_name,
            cell.value AS value
        FROM table_row
        LEFT JOIN cell ON cell.row_id = table_row.id
        LEFT JOIN table_column ON table_column.id = cell.column_id
        WHERE table_row.table_id = $1
        ORDER BY table_row.row_number, table_column.name
        "#,
        )
        .bind(table_id)
        .fetch(&self.executor)
        .try_collect()
        .await
        .map_err($repo::interpret_error)?;

        Ok(cells)
    }
}

};
}
