use sqlx::Connection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;

    let mut conn = pool.acquire().await?;
    conn.ping().await?;

    Ok(pool)
}

/// Look up the declared SQL type of every column in `columns`.
///
/// Postgres will not assign a text parameter to a typed column implicitly,
/// so each placeholder is cast to the type found here. Columns that cannot be
/// found come back as `None`; the insert itself then reports the problem.
pub async fn column_types(
    pool: &PgPool,
    table: &str,
    columns: &[String],
) -> Result<Vec<Option<String>>, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"SELECT a.attname::text, format_type(a.atttypid, a.atttypmod)
           FROM pg_attribute a
           WHERE a.attrelid = $1::regclass
             AND a.attnum > 0
             AND NOT a.attisdropped"#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    let types: HashMap<String, String> = rows.into_iter().collect();

    Ok(columns
        .iter()
        .map(|column| {
            types
                .get(column)
                .or_else(|| types.get(&column.to_lowercase()))
                .cloned()
        })
        .collect())
}

/// Run `sql` once as an unnamed statement on a connection borrowed for this call only.
pub async fn execute(
    pool: &PgPool,
    sql: &str,
    args: &[Option<String>],
) -> Result<u64, sqlx::Error> {
    let mut conn = pool.acquire().await?;

    let mut query = sqlx::query(sql).persistent(false);
    for arg in args {
        query = query.bind(arg.as_deref());
    }

    let result = query.execute(&mut *conn).await?;
    Ok(result.rows_affected())
}
