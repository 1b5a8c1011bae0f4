use std::time::Duration;
use thiserror::Error;

use crate::database::DatabaseError;

/// Failures inside background observers. Logged by the dispatcher, never returned to a client.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("platform write failed: {0}")]
    Platform(#[from] DatabaseError),
}
