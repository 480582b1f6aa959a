//! Database connection setup
//!

use std::path::PathBuf;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use crate::migration::Migrator;

#[derive(Debug)]
pub enum DBError {
    SeaOrm(DbErr),
    IoError(std::io::Error),
}

impl From<DbErr> for DBError {
    fn from(err: DbErr) -> Self {
        DBError::SeaOrm(err)
    }
}

impl From<std::io::Error> for DBError {
    fn from(err: std::io::Error) -> Self {
        DBError::IoError(err)
    }
}

/// Opens the on-disk database, creating its parent directory if needed.
pub async fn new(
    db_path: &PathBuf,
    connect_timeout: Duration,
) -> Result<DatabaseConnection, DBError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating database directory {}", parent.display());
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    start_db(Some(db_path), connect_timeout).await
}

/// Connects and runs migrations. `None` gives a private in-memory database.
pub async fn start_db(
    db_path: Option<&PathBuf>,
    connect_timeout: Duration,
) -> Result<DatabaseConnection, DBError> {
    let mut options = match db_path {
        Some(path) => {
            let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
            options.max_connections(8);
            options
        }
        None => {
            // every connection to :memory: is its own database
            let mut options = ConnectOptions::new("sqlite::memory:");
            options.max_connections(1).min_connections(1);
            options
        }
    };
    options
        .connect_timeout(connect_timeout)
        .acquire_timeout(connect_timeout)
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Trace);

    debug!("Opening Database: {}", options.get_url());
    let conn = Database::connect(options).await?;

    Migrator::up(&conn, None).await?;
    debug!("Database migrations applied");

    Ok(conn)
}
