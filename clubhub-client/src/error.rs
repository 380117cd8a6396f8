use crate::api::Error as ApiError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request did not go through, or its answer made no sense
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    /// The server, or local validation, refused the request
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn is_validation(&self) -> bool {
        match self {
            Error::Api(e) => e.is_validation(),
            Error::Anyhow(_) => false,
        }
    }
}
