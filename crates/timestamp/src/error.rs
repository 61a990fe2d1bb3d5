use thiserror::Error;

pub type Result<T> = std::result::Result<T, TimestampError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// The underlying ring rejected the operation.
    #[error(transparent)]
    Ring(#[from] corelib::Error),
}
