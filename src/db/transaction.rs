//! Atomic execution of a batch of statements.
//!
//! A batch either commits as a whole or leaves no trace:
//! - SQL Server: `BEGIN TRANSACTION` before the first step, `COMMIT` after
//!   the last, and an explicit rollback when any step (or the commit) fails.
//! - PostgreSQL: the steps run inside a driver transaction; returning early
//!   drops it, which rolls it back.
//!
//! Steps run strictly in order and the first failure stops the batch.

use crate::db::Connection;
use crate::db::executor::execute;
use crate::db::params::describe_params;
use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

#[cfg(feature = "mssql")]
use crate::db::mssql;

/// Label reported for a failing step that carries none.
pub const DEFAULT_STEP_LABEL: &str = "No error message provided";

/// One statement of a transaction batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStep {
    pub query: String,
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// Diagnostic label logged and reported when this step fails
    #[serde(default, alias = "msg", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TransactionStep {
    /// Create a step without a label.
    pub fn new(query: impl Into<String>, params: Vec<QueryParam>) -> Self {
        Self {
            query: query.into(),
            params,
            label: None,
        }
    }

    /// Attach a diagnostic label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The label, or [`DEFAULT_STEP_LABEL`].
    pub fn label_or_default(&self) -> &str {
        self.label.as_deref().unwrap_or(DEFAULT_STEP_LABEL)
    }
}

/// Run every step against `conn` as one atomic unit.
///
/// On failure the step is logged with its label, query and parameters, the
/// transaction is rolled back and [`DbError::TransactionStep`] is returned
/// wrapping the driver error. Later steps are never attempted.
pub async fn insert_transaction(
    conn: &mut Connection<'_>,
    steps: &[TransactionStep],
) -> DbResult<()> {
    info!(
        backend = %conn.kind(),
        steps = steps.len(),
        "Running transaction batch"
    );

    impl_db_dispatch!(conn, {
        #[cfg(feature = "mssql")]
        Cursor(client) => {
            mssql::begin(client).await?;
            let outcome = run_steps(&mut Connection::Cursor(client), steps).await;
            mssql::commit_or_rollback(client, outcome).await
        },
        #[cfg(feature = "postgres")]
        ResultSet(pg) => {
            use sqlx::Connection as _;

            let mut tx = pg.begin().await?;
            run_steps(&mut Connection::ResultSet(&mut *tx), steps).await?;
            tx.commit().await?;
            debug!("Transaction committed (PostgreSQL)");
            Ok(())
        },
    })
}

async fn run_steps(conn: &mut Connection<'_>, steps: &[TransactionStep]) -> DbResult<()> {
    for (index, step) in steps.iter().enumerate() {
        let result = match execute(conn, &step.query, &step.params).await {
            Ok(executed) => executed.drain().await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!(
                step = index,
                label = %step.label_or_default(),
                sql = %step.query,
                params = %describe_params(&step.params),
                error = %e,
                "Problem with db transaction"
            );
            return Err(DbError::transaction_step(
                index,
                step.label_or_default(),
                step.query.clone(),
                step.params.clone(),
                e,
            ));
        }
    }
    Ok(())
}
