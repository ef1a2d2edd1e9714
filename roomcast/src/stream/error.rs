use thiserror::Error;

use super::state::StreamState;

/// Stream lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// Edge not present in the lifecycle graph
    #[error("Invalid stream state transition from {from:?} to {to:?}")]
    InvalidTransition { from: StreamState, to: StreamState },
}

pub type StateResult<T> = Result<T, StateError>;
