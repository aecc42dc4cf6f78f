//! Loader errors

use crate::LoaderId;

/// Errors returned by tree operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LazyError {
    #[error("loader {0} does not exist")]
    UnknownNode(LoaderId),

    #[error("parent loader {0} does not exist")]
    UnknownParent(LoaderId),

    #[error("no root loader registered and no parent given")]
    NoRoot,

    #[error("root loader {0} is already registered")]
    RootExists(LoaderId),
}
