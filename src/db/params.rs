//! Parameter binding utilities for database queries.
//!
//! This module binds `QueryParam` values positionally onto each driver's
//! query builder. Placeholder text is never touched.

use crate::models::QueryParam;

/// Bind a parameter to a SQL Server query.
#[cfg(feature = "mssql")]
pub(crate) fn bind_mssql_param<'a>(query: &mut tiberius::Query<'a>, param: &'a QueryParam) {
    match param {
        QueryParam::Null => query.bind(Option::<&str>::None),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind a parameter to a PostgreSQL query.
#[cfg(feature = "postgres")]
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Short, log-friendly rendering of a parameter list.
pub(crate) fn describe_params(params: &[QueryParam]) -> String {
    let parts: Vec<String> = params
        .iter()
        .map(|p| match p {
            QueryParam::Null => "NULL".to_string(),
            QueryParam::Bool(v) => v.to_string(),
            QueryParam::Int(v) => v.to_string(),
            QueryParam::Float(v) => v.to_string(),
            QueryParam::String(v) => format!("{:?}", v),
            QueryParam::Bytes(v) => format!("<{} bytes>", v.len()),
        })
        .collect();
    format!("({})", parts.join(", "))
}
