use crate::domain::entities::ConnectionStatus;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ConnectionStatus,
        to: ConnectionStatus,
    },
}

/// Validates if a connection lifecycle transition is allowed
pub fn validate_transition(
    from: ConnectionStatus,
    to: ConnectionStatus,
) -> Result<(), TransitionError> {
    use ConnectionStatus::*;

    match (from, to) {
        // Same state is always valid (no-op)
        (a, b) if a == b => Ok(()),

        (Pending, Connected) | (Pending, Error) | (Pending, Disabled) => Ok(()),
        (Connected, Error) | (Connected, Disabled) => Ok(()),
        (Error, Connected) | (Error, Disabled) => Ok(()),
        (Disabled, Connected) => Ok(()),

        _ => Err(TransitionError::InvalidTransition { from, to }),
    }
}
