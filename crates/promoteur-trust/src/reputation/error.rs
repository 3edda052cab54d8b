use std::fmt::Display;
use std::time::Duration;

use tracing::warn;

/// Failures raised by storage adapters.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected version {expected}, found {found}")]
    VersionMismatch { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Error taxonomy shared by every engine component.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("concurrent modification of {entity} {id}, retry later")]
    ConcurrencyConflict { entity: &'static str, id: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("cannot {action} {entity} while {from}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl Display,
        action: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            action,
        }
    }

    pub(crate) fn is_write_conflict(&self) -> bool {
        matches!(
            self,
            EngineError::Repository(RepositoryError::VersionMismatch { .. })
                | EngineError::Repository(RepositoryError::Conflict)
                | EngineError::ConcurrencyConflict { .. }
        )
    }
}

pub(crate) const CONFLICT_BACKOFF: Duration = Duration::from_millis(25);

/// Runs `operation`, retrying once after a short backoff when it loses an optimistic write.
/// A second loss surfaces as [`EngineError::ConcurrencyConflict`].
pub(crate) fn retry_on_conflict<T>(
    entity: &'static str,
    id: impl Display,
    mut operation: impl FnMut() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    match operation() {
        Err(err) if err.is_write_conflict() => {
            warn!(entity, id = %id, error = %err, "write conflict, retrying once");
            std::thread::sleep(CONFLICT_BACKOFF);
            operation().map_err(|err| {
                if err.is_write_conflict() {
                    EngineError::ConcurrencyConflict {
                        entity,
                        id: id.to_string(),
                    }
                } else {
                    err
                }
            })
        }
        other => other,
    }
}
