//! PostgreSQL adapter (result-set-style backend).
//!
//! Reads come back as complete row sets, everything else as the driver's
//! `PgQueryResult`. Atomic batches use the driver's own transaction scope.

use crate::db::params::bind_postgres_param;
use crate::error::DbResult;
use crate::models::QueryParam;
use sqlx::PgConnection;
use sqlx::postgres::{PgArguments, PgQueryResult, PgRow};

/// Result of running one statement.
#[derive(Debug)]
pub enum PgExecuted {
    /// Rows of a `select`
    Rows(Vec<PgRow>),
    /// Status of any other statement
    Status(PgQueryResult),
}

/// Whether the statement's leading keyword is `select` (whitespace trimmed,
/// case-insensitive).
pub fn is_read_query(sql: &str) -> bool {
    let trimmed = sql.trim_start();
    trimmed
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}

/// Run a statement, fetching rows for reads and a status otherwise.
pub async fn execute(
    conn: &mut PgConnection,
    sql: &str,
    params: &[QueryParam],
) -> DbResult<PgExecuted> {
    if is_read_query(sql) {
        return Ok(PgExecuted::Rows(fetch_rows(conn, sql, params).await?));
    }

    // When params is empty, execute raw SQL directly to avoid prepared statement issues
    let result = if params.is_empty() {
        use sqlx::Executor;
        (&mut *conn).execute(sql).await?
    } else {
        build_query(sql, params).execute(&mut *conn).await?
    };
    Ok(PgExecuted::Status(result))
}

/// Run a statement and collect every row it returns.
pub async fn fetch_rows(
    conn: &mut PgConnection,
    sql: &str,
    params: &[QueryParam],
) -> DbResult<Vec<PgRow>> {
    let rows = if params.is_empty() {
        use sqlx::Executor;
        (&mut *conn).fetch_all(sql).await?
    } else {
        build_query(sql, params).fetch_all(&mut *conn).await?
    };
    Ok(rows)
}

/// Append a `RETURNING` clause for the generated id column.
pub fn with_returning_suffix(query: &str, id_column: &str) -> String {
    format!("{} RETURNING {};", query.trim_end(), id_column)
}

fn build_query<'q>(
    sql: &'q str,
    params: &'q [QueryParam],
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = bind_postgres_param(query, param);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_read_query() {
        assert!(is_read_query("select email from users"));
        assert!(is_read_query("  SELECT 1"));
        assert!(is_read_query("\n\tSelect * from t"));
        assert!(!is_read_query("update users set active = $1"));
        assert!(!is_read_query("insert into t values (1)"));
        assert!(!is_read_query("sel"));
        assert!(!is_read_query(""));
    }

    #[test]
    fn test_with_clause_is_not_a_read() {
        assert!(!is_read_query("WITH x AS (SELECT 1) SELECT * FROM x"));
    }

    #[test]
    fn test_is_read_query_multibyte_prefix() {
        assert!(!is_read_query("é select"));
    }

    #[test]
    fn test_returning_suffix() {
        assert_eq!(
            with_returning_suffix("insert into users (email) values ($1)", "id"),
            "insert into users (email) values ($1) RETURNING id;"
        );
        assert_eq!(
            with_returning_suffix("insert into orders default values  ", "order_id"),
            "insert into orders default values RETURNING order_id;"
        );
    }
}
