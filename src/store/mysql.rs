use sqlx::Connection;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

pub async fn connect(url: &str, max_connections: u32) -> Result<MySqlPool, sqlx::Error> {
    let pool = MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;

    let mut conn = pool.acquire().await?;
    conn.ping().await?;

    Ok(pool)
}

/// Run `sql` once as a non-cached prepared statement.
///
/// MySQL coerces text arguments into the column type, so values are bound as
/// strings and `None` becomes SQL NULL.
pub async fn execute(
    pool: &MySqlPool,
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
