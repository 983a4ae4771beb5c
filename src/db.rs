use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Pool, Sqlite};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS todo (
        todo_id INTEGER PRIMARY KEY AUTOINCREMENT,
        description TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1))
    );"#,
    r#"CREATE TABLE IF NOT EXISTS users (
        user_id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS refresh_tokens (
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        username TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );"#,
];

/// Opens the pool, creating the database file first if it does not exist yet.
pub async fn connect(database_url: &str) -> Result<Pool<Sqlite>, sqlx::Error> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        tracing::info!(database_url, "creating database");
        Sqlite::create_database(database_url).await?;
    } else {
        tracing::info!(database_url, "database already exists");
    }

    SqlitePoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

pub async fn init_schema(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

// A single pinned connection, otherwise every pooled connection gets its own
// empty in-memory database.
#[cfg(test)]
pub(crate) async fn memory_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_is_idempotent() {
        let pool = memory_pool().await;
        init_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        let names: Vec<_> = tables.into_iter().map(|(name,)| name).collect();
        assert_eq!(names, ["refresh_tokens", "todo", "users"]);
    }

    #[tokio::test]
    async fn active_flag_is_constrained() {
        let pool = memory_pool().await;
        let result = sqlx::query("INSERT INTO todo (description, active) VALUES ('x', 5)")
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }
}
