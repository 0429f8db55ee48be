/// Builder-style configuration for embedder implementations.
/// Empty fields fall back to implementation defaults.
#[derive(Default)]
pub struct EmbedConfig {
    pub model: String,
    pub detector_backend: String,
    pub base_url: String,
}

impl EmbedConfig {
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_detector_backend(mut self, backend: &str) -> Self {
        self.detector_backend = backend.to_string();
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}
