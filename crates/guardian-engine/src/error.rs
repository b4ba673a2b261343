use thiserror::Error;
use uuid::Uuid;

use domain::models::CommandStateError;

use crate::transport::TransportError;

/// Errors surfaced by the engine's public operations.
///
/// Per-bracelet transport failures (push drops, poll errors) are recovered
/// inside the workers and never reach this type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unknown event: {0}")]
    UnknownEvent(Uuid),

    #[error("unknown command: {0}")]
    UnknownCommand(Uuid),

    #[error(transparent)]
    CommandState(#[from] CommandStateError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("engine is shut down")]
    ShutDown,
}
