/// Face recognition models supported by the represent service, with
/// their embedding dimensions.
pub const AVAILABLE_MODELS: &[(&str, usize)] = &[
    ("VGG-Face", 2622),
    ("Facenet", 128),
    ("Facenet512", 512),
    ("OpenFace", 128),
    ("DeepFace", 4096),
    ("DeepID", 160),
    ("ArcFace", 512),
    ("Dlib", 128),
    ("SFace", 128),
];

/// Default model. ArcFace gives the best benchmark accuracy of the
/// supported set and produces 512-dimensional embeddings.
pub const DEFAULT_MODEL: &str = "ArcFace";

/// Returns the embedding dimension for a model name, or None for an
/// unknown model. The model → dimension mapping is static: a registry
/// built for one model can never consume another model's vectors.
pub fn model_dimension(model: &str) -> Option<usize> {
    AVAILABLE_MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dim)| *dim)
}
