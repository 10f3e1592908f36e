use std::sync::Arc;

use crate::{
    catalog::metastore::Metastore,
    repository::{interface::Repository, sqlite::SqliteRepository},
};

#[cfg(feature = "catalog-postgres")]
use crate::repository::postgres::PostgresRepository;

use super::schema;

/// Connects to the configured catalog database, migrating it if needed.
pub async fn build_metastore(
    config: &schema::TabulaConfig,
) -> Result<Metastore, sqlx::Error> {
    let repository: Arc<dyn Repository> = match &config.catalog {
        #[cfg(feature = "catalog-postgres")]
        schema::Catalog::Postgres(schema::Postgres { dsn, schema }) => Arc::new(
            PostgresRepository::try_new(dsn.to_string(), schema.to_string()).await?,
        ),
        schema::Catalog::Sqlite(schema::Sqlite { dsn, journal_mode }) => Arc::new(
            SqliteRepository::try_new(dsn.to_string(), (*journal_mode).into()).await?,
        ),
    };

    Ok(Metastore::new_from_repository(
        repository,
        config.misc.modify_retries,
    ))
}
