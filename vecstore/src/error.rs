use thiserror::Error;

#[derive(Error, Debug)]
pub enum VecError {
    #[error("vecstore: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("vecstore: API error: {0}")]
    Api(String),

    #[error("vecstore: index not ready: {0}")]
    NotReady(String),
}
