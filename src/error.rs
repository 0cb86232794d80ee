use thiserror::Error;

use crate::provider::ProviderError;

/// User-visible message when both generation tiers are exhausted.
pub const EXHAUSTED_MESSAGE: &str =
    "Unable to generate tattoo. Please try again or use a different image.";

#[derive(Debug, Error)]
pub enum InkError {
    #[error("Please enter your Replicate API token to continue.")]
    MissingCredential,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Image processing error: {0}")]
    Image(String),
    #[error("{}", EXHAUSTED_MESSAGE)]
    GenerationExhausted {
        primary: ProviderError,
        fallback: ProviderError,
    },
    #[error("Credential storage error: {0}")]
    CredentialStore(String),
}

impl From<image::ImageError> for InkError {
    fn from(e: image::ImageError) -> Self {
        InkError::Image(e.to_string())
    }
}
