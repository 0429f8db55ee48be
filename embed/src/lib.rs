pub mod config;
pub mod embed;
pub mod error;
pub mod model;
pub mod represent;

pub use config::EmbedConfig;
pub use embed::{FaceEmbedder, FaceEmbedding, FacialArea, ImageInput};
pub use error::EmbedError;
pub use model::{AVAILABLE_MODELS, DEFAULT_MODEL, model_dimension};
pub use represent::RepresentClient;
