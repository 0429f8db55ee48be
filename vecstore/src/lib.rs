pub mod cosine;
pub mod error;
pub mod memory;
pub mod pinecone;
pub mod vecstore;

pub use cosine::cosine_similarity;
pub use error::VecError;
pub use memory::MemoryIndex;
pub use pinecone::{PineconeConfig, PineconeIndex};
pub use vecstore::{IndexStats, Match, Metadata, Page, Record, VectorIndex};
