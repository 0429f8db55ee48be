use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embed: no face detected in image")]
    NoFaceDetected,

    #[error("embed: invalid image: {0}")]
    InvalidImage(String),

    #[error("embed: unknown model: {0}")]
    UnknownModel(String),

    #[error("embed: API error: {0}")]
    Api(String),
}
