use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid provider base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Media not found upstream")]
    NotFound,

    #[error("Unexpected upstream response: {0}")]
    Parse(String),

    #[error("All configured providers failed (last error: {last})")]
    AllProvidersFailed { last: String },
}

impl From<ProviderError> for crate::Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound => crate::Error::NotFound("Media not found".to_string()),
            other => crate::Error::Upstream(other.to_string()),
        }
    }
}
