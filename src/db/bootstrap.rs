use crate::db::pool::DuckDbConnectionManager;
use r2d2::Pool;
use tracing::info;

/// DDL for the queryable tables. The sync jobs that populate them are a
/// separate service; the query side only needs the tables to exist so a
/// fresh store answers "no results" instead of erroring.
const TABLE_DDL: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "File" (
        "id" VARCHAR PRIMARY KEY,
        "user_id" VARCHAR NOT NULL,
        "name" VARCHAR NOT NULL,
        "mime_type" VARCHAR,
        "owners" VARCHAR,
        "size_bytes" BIGINT,
        "web_link" VARCHAR,
        "modified_at" TIMESTAMP,
        "created_at" TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "Email" (
        "id" VARCHAR PRIMARY KEY,
        "user_id" VARCHAR NOT NULL,
        "subject" VARCHAR,
        "sender" VARCHAR,
        "recipients" VARCHAR,
        "snippet" VARCHAR,
        "is_unread" BOOLEAN,
        "received_at" TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "TrelloCard" (
        "id" VARCHAR PRIMARY KEY,
        "user_id" VARCHAR NOT NULL,
        "name" VARCHAR NOT NULL,
        "description" VARCHAR,
        "board_name" VARCHAR,
        "list_name" VARCHAR,
        "due_at" TIMESTAMP,
        "is_closed" BOOLEAN,
        "updated_at" TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "SyncStatus" (
        "source" VARCHAR PRIMARY KEY,
        "last_synced_at" TIMESTAMP,
        "record_count" BIGINT
    )"#,
];

/// Creates the queryable tables if they are missing. Idempotent.
pub async fn ensure_tables(
    pool: Pool<DuckDbConnectionManager>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tokio::task::spawn_blocking(move || -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let conn = pool.get()?;
        for ddl in TABLE_DDL {
            conn.execute(ddl, [])?;
        }
        Ok(())
    })
    .await??;

    info!("Database tables verified");
    Ok(())
}
