// SPDX-FileCopyrightText: 2024 Kerstin Humm <mail@erictapen.name>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;
use thiserror::Error;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Per connection settings. Foreign keys are off by default in SQLite, without them the cascade
/// from pulls to trains to station_times wouldn't happen. WAL lets the web server read while the
/// crawler writes.
const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
    PRAGMA journal_mode = WAL;
";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to open database {url}")]
    Connect {
        url: String,
        #[source]
        source: ConnectionError,
    },
    #[error("failed to configure database connection")]
    Configure(#[from] diesel::result::Error),
    #[error("failed to run database migrations")]
    Migrations(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Open a connection with our pragmas applied, without touching the schema.
pub fn connect(db_url: &str) -> Result<SqliteConnection, DbError> {
    let mut db = SqliteConnection::establish(db_url).map_err(|source| DbError::Connect {
        url: db_url.to_string(),
        source,
    })?;
    db.batch_execute(CONNECTION_PRAGMAS)?;
    Ok(db)
}

pub fn run_db_migrations(db: &mut SqliteConnection) -> Result<(), DbError> {
    info!("Running migrations...");
    let migrations_run = db
        .run_pending_migrations(MIGRATIONS)
        .map_err(DbError::Migrations)?;
    info!(
        "Ran {} pending migrations: {:?}",
        migrations_run.len(),
        migrations_run
    );
    Ok(())
}

/// Open a connection and bring the schema up to date.
pub fn establish(db_url: &str) -> Result<SqliteConnection, DbError> {
    let mut db = connect(db_url)?;
    run_db_migrations(&mut db)?;
    Ok(db)
}
