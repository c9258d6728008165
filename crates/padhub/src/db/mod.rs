//! Database module for pad persistence.
//!
//! Connects to Postgres, ensures the `pad` schema and its tables exist, and
//! hands out scoped transactional sessions. Table creation is additive only;
//! there is no migration machinery.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{error, info};

use crate::settings::DbSettings;

/// Schema holding all pad tables.
pub const SCHEMA_NAME: &str = "pad";

/// Statements run at startup. `IF NOT EXISTS` keeps them idempotent; existing
/// tables are never altered.
const CREATE_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS pad.users (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        coder_user_id UUID NOT NULL,
        email TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pad.pads (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        owner_id UUID NOT NULL REFERENCES pad.users(id),
        title TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

/// Database connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to Postgres.
    pub async fn connect(settings: &DbSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&settings.url())
            .await
            .with_context(|| {
                format!(
                    "connecting to postgres at {}:{}/{}",
                    settings.host, settings.port, settings.db
                )
            })?;

        Ok(Self { pool })
    }

    /// Ensure the schema and all tables exist. Intended to run once at
    /// process start; failures abort startup.
    pub async fn init(&self) -> Result<()> {
        if let Err(err) = self.create_schema_and_tables().await {
            error!("error initializing database: {err:#}");
            return Err(err);
        }
        info!(schema = SCHEMA_NAME, "database initialized");
        Ok(())
    }

    async fn create_schema_and_tables(&self) -> Result<()> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {SCHEMA_NAME}"))
            .execute(&self.pool)
            .await
            .context("creating schema")?;

        for statement in CREATE_TABLES {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("creating tables")?;
        }

        Ok(())
    }

    /// Open a scoped transactional session.
    ///
    /// The returned transaction rolls back on drop unless committed, so the
    /// connection is released on every exit path.
    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>> {
        self.pool.begin().await.context("opening session")
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
