use std::path::PathBuf;

use crate::error::EmbedError;

/// Image handed to the embedder: either a path readable by this
/// process or raw encoded bytes (JPEG/PNG).
#[derive(Debug, Clone)]
pub enum ImageInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ImageInput {
    pub fn path(p: impl Into<PathBuf>) -> Self {
        Self::Path(p.into())
    }

    pub fn bytes(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Pixel region of the source image where a face was detected.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FacialArea {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// One detected face: its embedding vector plus detection metadata.
#[derive(Debug, Clone)]
pub struct FaceEmbedding {
    /// Fixed-length embedding; length is determined by the model.
    pub embedding: Vec<f32>,

    /// Where in the source image the face was found.
    pub facial_area: FacialArea,

    /// Detector confidence in [0, 1].
    pub confidence: f32,
}

/// FaceEmbedder converts an image into embeddings, one per detected
/// face.
///
/// Implementations must be safe for concurrent use (Send + Sync).
/// Zero detected faces is a distinct failure (`NoFaceDetected`) from a
/// processing error; callers branch on the kind to show guidance vs. a
/// retry affordance.
#[async_trait::async_trait]
pub trait FaceEmbedder: Send + Sync {
    /// Return one embedding per detected face, in service order.
    /// Picking one face out of several is the caller's job.
    async fn represent(&self, image: &ImageInput) -> Result<Vec<FaceEmbedding>, EmbedError>;

    /// Name of the recognition model in use.
    fn model(&self) -> &str;

    /// Dimensionality of the output embeddings.
    fn dimension(&self) -> usize;
}
