use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};

use crate::{
    config::Config,
    errors::{RentalError, Result},
};

/// Opens the pool described by `config`. Foreign keys are enforced so that
/// deleting a car or customer cascades to its leases.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .read_only(false)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(opts)
        .await
        .map_err(|e| {
            log::error!("Failed to open database {}: {}", config.database_url, e);
            RentalError::Database(e)
        })?;

    log::info!("Connected to {}", config.database_url);
    Ok(db_pool)
}

/// A migrated in-memory database. The pool holds exactly one connection that
/// is never recycled, because every connection to `:memory:` is a separate
/// database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!().run(db_pool).await?;
    log::info!("Database migrated successfully");
    Ok(())
}

/// Extracts the key produced by an `INSERT ... RETURNING id`. Exactly one row
/// with exactly one column is accepted.
pub(crate) fn generated_key(rows: &[SqliteRow], what: &str) -> Result<i64> {
    let row = match rows {
        [] => {
            return Err(RentalError::ServiceFailure(format!(
                "generated key retrieving failed when trying to insert {what} - no key found"
            )))
        }
        [row] => row,
        _ => {
            return Err(RentalError::ServiceFailure(format!(
                "generated key retrieving failed when trying to insert {what} - more keys found ({})",
                rows.len()
            )))
        }
    };

    let columns = row.columns().len();
    if columns != 1 {
        return Err(RentalError::ServiceFailure(format!(
            "generated key retrieving failed when trying to insert {what} - wrong key fields count: {columns}"
        )));
    }
    Ok(row.try_get::<i64, _>(0)?)
}

/// Rejects negative ids before they reach a query.
pub(crate) fn check_lookup_id(id: i64) -> Result<()> {
    if id < 0 {
        return Err(RentalError::invalid(format!("id {id} is negative")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generated_key_requires_single_row() {
        let pool = connect_in_memory().await.unwrap();

        let none: Vec<SqliteRow> = sqlx::query("SELECT 1 WHERE 0")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(matches!(
            generated_key(&none, "car"),
            Err(RentalError::ServiceFailure(_))
        ));

        let two = sqlx::query("SELECT 1 UNION ALL SELECT 2")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(matches!(
            generated_key(&two, "car"),
            Err(RentalError::ServiceFailure(_))
        ));

        let one = sqlx::query("SELECT 42").fetch_all(&pool).await.unwrap();
        assert_eq!(generated_key(&one, "car").unwrap(), 42);
    }

    #[tokio::test]
    async fn generated_key_requires_single_column() {
        let pool = connect_in_memory().await.unwrap();
        let wide = sqlx::query("SELECT 1, 2").fetch_all(&pool).await.unwrap();
        let err = generated_key(&wide, "customer").unwrap_err();
        assert!(err.to_string().contains("wrong key fields count: 2"));
    }

    #[test]
    fn negative_lookup_ids_are_rejected() {
        assert!(check_lookup_id(-1).is_err());
        assert!(check_lookup_id(0).is_ok());
    }
}
