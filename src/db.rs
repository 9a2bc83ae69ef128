use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::ApiError;

/// Pool-backed transaction handed to a unit of work.
pub type Tx = Transaction<'static, Postgres>;

/// Run a unit of work inside a single transaction.
///
/// Commits on success and rolls back on every error path; the connection is
/// returned to the pool exactly once either way (rollback also runs on drop
/// if the explicit call fails). Store errors surface through
/// `From<sqlx::Error> for ApiError`; an error that is already an `ApiError`
/// propagates unchanged.
pub async fn with_transaction<T, F>(pool: &PgPool, op: F) -> Result<T, ApiError>
where
    F: for<'t> FnOnce(&'t mut Tx) -> BoxFuture<'t, Result<T, ApiError>>,
{
    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    match op(&mut tx).await {
        Ok(value) => {
            tx.commit().await.map_err(ApiError::from)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rb) = tx.rollback().await {
                tracing::error!(error = %rb, "transaction rollback failed");
            }
            Err(err)
        }
    }
}
