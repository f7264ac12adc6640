use thiserror::Error;

/// Failure kinds surfaced to API callers.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Class not found")]
    ClassNotFound,
    #[error("Subject not found")]
    SubjectNotFound,
    #[error("Category not found")]
    CategoryNotFound,
    #[error("File not found")]
    FileNotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl PortalError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl From<std::io::Error> for PortalError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.into())
    }
}

pub type Result<T, E = PortalError> = std::result::Result<T, E>;
