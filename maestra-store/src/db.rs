// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::{StoreError, StoreErrorKind};

/// Connects to `database_url` and runs pending migrations, matching the
/// teacher's connect-then-ready pattern for its own managed clients.
///
/// # Errors
/// [`StoreErrorKind::Database`] if the pool cannot be established or a
/// migration fails.
pub async fn connect(database_url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(StoreErrorKind::Database)?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreErrorKind::Database(sqlx::Error::Migrate(Box::new(e))))?;
    Ok(pool)
}
