/// Errors surfaced synchronously at the registry/dispatcher boundary.
///
/// Delivery-time failures are never raised through this type: they are
/// recorded on the delivery record and retried per policy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
