use anyhow::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use tokio::fs;

use crate::error::{AppError, AppResult};

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

/// Name of the composite index behind the owner-scoped "recent first"
/// order queries. Created by migrations; its absence is a deployment
/// error, not a runtime-recoverable condition.
pub const ORDERS_OWNER_CREATED_INDEX: &str = "idx_orders_user_created";

pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<OrmConn> {
    let conn = Database::connect(database_url).await?;
    Ok(conn)
}

/// Minimal migration runner that executes SQL files in `migrations/` in
/// filename order. Used by tests and the migrate binary; the server itself
/// runs `sqlx::migrate!`.
pub async fn run_migrations(conn: &OrmConn) -> Result<()> {
    let mut entries = fs::read_dir("migrations").await?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let backend = conn.get_database_backend();
    for file in files {
        let sql = fs::read_to_string(&file).await?;
        // Postgres prepared statements cannot contain multiple commands,
        // so split the migration file and run each statement individually.
        for stmt in sql.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            let statement = format!("{stmt};");
            conn.execute(Statement::from_string(backend, statement))
                .await?;
        }
    }

    Ok(())
}

/// Verify the composite indexes the order queries depend on actually exist.
/// Surfaces a missing index verbatim instead of letting the first
/// owner-ordered query fail with an opaque scan plan.
pub async fn ensure_indexes(pool: &DbPool) -> AppResult<()> {
    let found: Option<(String,)> = sqlx::query_as(
        "SELECT indexname FROM pg_indexes WHERE tablename = 'orders' AND indexname = $1",
    )
    .bind(ORDERS_OWNER_CREATED_INDEX)
    .fetch_optional(pool)
    .await?;

    if found.is_none() {
        return Err(AppError::IndexMissing(format!(
            "{ORDERS_OWNER_CREATED_INDEX} on orders (user_id ASC, created_at DESC); run migrations before serving"
        )));
    }

    Ok(())
}
