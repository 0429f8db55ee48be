use faceid_embed::EmbedError;
use faceid_vecstore::{Metadata, VecError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry: no face detected in image")]
    NoFaceDetected,

    #[error("registry: embedding provider error: {0}")]
    Provider(String),

    #[error("registry: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("registry: duplicate face: existing id {id} (score {score:.3})")]
    DuplicateFound {
        id: String,
        score: f32,
        metadata: Metadata,
    },

    #[error("registry: store error: {0}")]
    Store(String),

    #[error("registry: backing index dimension {index} does not match configured {configured}")]
    ConfigMismatch { index: usize, configured: usize },

    #[error("registry: could not generate an unused id")]
    IdExhausted,
}

impl From<EmbedError> for RegistryError {
    fn from(e: EmbedError) -> Self {
        match e {
            EmbedError::NoFaceDetected => RegistryError::NoFaceDetected,
            other => RegistryError::Provider(other.to_string()),
        }
    }
}

impl From<VecError> for RegistryError {
    fn from(e: VecError) -> Self {
        match e {
            VecError::DimensionMismatch { got, want } => {
                RegistryError::DimensionMismatch { got, want }
            }
            other => RegistryError::Store(other.to_string()),
        }
    }
}
