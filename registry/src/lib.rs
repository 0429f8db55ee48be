pub mod error;
pub mod registry;

#[cfg(test)]
mod tests;

pub use error::RegistryError;
pub use registry::{FaceEntry, FaceMatch, Registry, RegistryConfig};
