use sqlx::AnyPool;
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use tracing::info;

/// String ids, timestamps as RFC 3339 text, flags as BIGINT. Only DDL that
/// both MySQL and SQLite accept.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        user_id VARCHAR(64) NOT NULL UNIQUE,
        email VARCHAR(255) NOT NULL UNIQUE,
        name VARCHAR(255) NOT NULL,
        role VARCHAR(16) NOT NULL,
        ai_tokens_remaining BIGINT NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        created_at VARCHAR(40) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        description VARCHAR(4000) NOT NULL,
        assigned_to VARCHAR(64) NOT NULL,
        due_date VARCHAR(40) NOT NULL,
        priority VARCHAR(16) NOT NULL,
        status VARCHAR(16) NOT NULL,
        created_at VARCHAR(40) NOT NULL,
        updated_at VARCHAR(40) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        user_id VARCHAR(64) NOT NULL,
        work_date VARCHAR(10) NOT NULL,
        status VARCHAR(16) NOT NULL,
        clock_in_time VARCHAR(40) NULL,
        clock_out_time VARCHAR(40) NULL,
        created_at VARCHAR(40) NOT NULL,
        updated_at VARCHAR(40) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        sender_id VARCHAR(64) NOT NULL,
        receiver_id VARCHAR(64) NOT NULL,
        content VARCHAR(4000) NOT NULL,
        is_read BIGINT NOT NULL DEFAULT 0,
        created_at VARCHAR(40) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ai_usage (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        user_id VARCHAR(64) NOT NULL,
        tokens_used BIGINT NOT NULL,
        prompt TEXT NOT NULL,
        response TEXT NOT NULL,
        created_at VARCHAR(40) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS refresh_tokens (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        user_id VARCHAR(64) NOT NULL,
        jti VARCHAR(64) NOT NULL UNIQUE,
        expires_at BIGINT NOT NULL,
        revoked BIGINT NOT NULL DEFAULT 0
    )
    "#,
];

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<AnyPool, sqlx::Error> {
    install_default_drivers();

    let mut options = AnyPoolOptions::new().max_connections(max_connections);

    // every connection to an in-memory sqlite database is a fresh database,
    // so the pool must never recycle its single connection
    if database_url.starts_with("sqlite::memory:") {
        options = options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = options.connect(database_url).await?;
    init_schema(&pool).await?;

    Ok(pool)
}

pub async fn init_schema(pool: &AnyPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    info!(tables = SCHEMA.len(), "Schema ready");
    Ok(())
}
