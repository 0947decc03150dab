use crate::models::FiberRef;

/// Typed engine failures. They travel inside `anyhow::Error` and are
/// recovered by downcast in the API error handler.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("splice cycle detected at {0}")]
    CycleDetected(FiberRef),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
}

impl TopologyError {
    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }
}

/// Convert constraint and lock errors raised inside a write transaction into
/// `Conflict`, so a lost race surfaces as retryable instead of internal.
pub fn map_write_error(err: sqlx::Error) -> anyhow::Error {
    match write_conflict(&err) {
        Some(conflict) => conflict.into(),
        None => err.into(),
    }
}

/// Same as `map_write_error` for a repo result that already went through
/// `anyhow`, including errors wrapped in `.context(..)`.
pub fn map_tx_error(err: anyhow::Error) -> anyhow::Error {
    if err.topology_error().is_some() {
        return err;
    }
    match err.downcast_ref::<sqlx::Error>().and_then(write_conflict) {
        Some(conflict) => conflict.into(),
        None => err,
    }
}

fn write_conflict(err: &sqlx::Error) -> Option<TopologyError> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.is_unique_violation() {
        return Some(TopologyError::conflict(format!(
            "concurrent modification: {}",
            db_err.message()
        )));
    }
    // SQLITE_BUSY (5) and SQLITE_LOCKED (6), including extended codes
    let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
    match code.parse::<i64>() {
        Ok(n) if matches!(n & 0xff, 5 | 6) => Some(TopologyError::conflict(
            "topology is being modified concurrently, retry",
        )),
        _ => None,
    }
}

/// Extension for pulling a `TopologyError` back out of an `anyhow::Error`
pub trait TopologyErrorExt {
    fn topology_error(&self) -> Option<&TopologyError>;
}

impl TopologyErrorExt for anyhow::Error {
    fn topology_error(&self) -> Option<&TopologyError> {
        self.downcast_ref::<TopologyError>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = map_tx_error(anyhow::Error::new(sqlx::Error::RowNotFound).context("loading splice"));
        assert!(err.topology_error().is_none());
        assert!(err.downcast_ref::<sqlx::Error>().is_some());

        let err = map_tx_error(TopologyError::invalid("bad fiber").into());
        assert!(matches!(err.topology_error(), Some(TopologyError::InvalidOperation(_))));
    }
}
