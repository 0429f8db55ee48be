use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbedConfig;
use crate::embed::{FaceEmbedder, FaceEmbedding, FacialArea, ImageInput};
use crate::error::EmbedError;
use crate::model::{DEFAULT_MODEL, model_dimension};

const DEFAULT_BASE_URL: &str = "http://localhost:5005";
const DEFAULT_DETECTOR: &str = "opencv";

/// Represent request body (DeepFace API service wire format).
#[derive(Serialize)]
struct RepresentRequest<'a> {
    model_name: &'a str,
    detector_backend: &'a str,
    img: String,
    enforce_detection: bool,
    align: bool,
}

#[derive(Deserialize)]
struct RepresentResponse {
    #[serde(default)]
    results: Vec<RepresentResult>,
}

#[derive(Deserialize)]
struct RepresentResult {
    embedding: Vec<f64>,
    facial_area: WireFacialArea,
    #[serde(default)]
    face_confidence: f32,
}

#[derive(Deserialize)]
struct WireFacialArea {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

/// RepresentClient talks to a DeepFace-style HTTP represent service.
///
/// The service detects faces in the image and returns one embedding
/// plus facial area per face. Zero detected faces surfaces as
/// `EmbedError::NoFaceDetected`, everything else as `Api`.
#[derive(Debug)]
pub struct RepresentClient {
    client: Client,
    base_url: String,
    model: String,
    detector_backend: String,
    dim: usize,
}

impl RepresentClient {
    pub fn new(base_url: &str) -> Result<Self, EmbedError> {
        Self::with_config(EmbedConfig::default().with_base_url(base_url))
    }

    pub fn with_config(cfg: EmbedConfig) -> Result<Self, EmbedError> {
        let model = if cfg.model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            cfg.model
        };
        let dim = model_dimension(&model).ok_or_else(|| EmbedError::UnknownModel(model.clone()))?;
        Ok(Self {
            client: Client::new(),
            base_url: if cfg.base_url.is_empty() {
                DEFAULT_BASE_URL.to_string()
            } else {
                cfg.base_url
            },
            model,
            detector_backend: if cfg.detector_backend.is_empty() {
                DEFAULT_DETECTOR.to_string()
            } else {
                cfg.detector_backend
            },
            dim,
        })
    }

    /// Encode the image for the wire: paths are read from the local
    /// filesystem, and both variants are sent as a base64 data URI.
    fn encode_image(&self, image: &ImageInput) -> Result<String, EmbedError> {
        match image {
            ImageInput::Path(p) => {
                let bytes = std::fs::read(p)
                    .map_err(|e| EmbedError::InvalidImage(format!("{}: {e}", p.display())))?;
                Ok(to_data_uri(&bytes))
            }
            ImageInput::Bytes(b) => {
                if b.is_empty() {
                    return Err(EmbedError::InvalidImage("empty image".into()));
                }
                Ok(to_data_uri(b))
            }
        }
    }
}

fn to_data_uri(bytes: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:image/jpeg;base64,{b64}")
}

/// True when an error body reports that detection found no face, as
/// opposed to a processing failure.
fn is_no_face_error(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("could not be detected") || lower.contains("no face")
}

#[async_trait::async_trait]
impl FaceEmbedder for RepresentClient {
    async fn represent(&self, image: &ImageInput) -> Result<Vec<FaceEmbedding>, EmbedError> {
        let img = self.encode_image(image)?;
        let url = format!("{}/represent", self.base_url);
        let body = RepresentRequest {
            model_name: &self.model,
            detector_backend: &self.detector_backend,
            img,
            enforce_detection: true,
            align: true,
        };

        debug!(model = %self.model, %url, "represent request");
        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let msg = serde_json::from_str::<ErrorBody>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            if is_no_face_error(&msg) {
                return Err(EmbedError::NoFaceDetected);
            }
            return Err(EmbedError::Api(format!("HTTP {status}: {msg}")));
        }

        let data: RepresentResponse = resp.json().await.map_err(|e| EmbedError::Api(e.to_string()))?;
        if data.results.is_empty() {
            return Err(EmbedError::NoFaceDetected);
        }

        data.results
            .into_iter()
            .map(|r| {
                if r.embedding.len() != self.dim {
                    return Err(EmbedError::Api(format!(
                        "model {} returned {}-dim embedding, expected {}",
                        self.model,
                        r.embedding.len(),
                        self.dim
                    )));
                }
                Ok(FaceEmbedding {
                    embedding: r.embedding.iter().map(|&v| v as f32).collect(),
                    facial_area: FacialArea {
                        x: r.facial_area.x,
                        y: r.facial_area.y,
                        w: r.facial_area.w,
                        h: r.facial_area.h,
                    },
                    confidence: r.face_confidence,
                })
            })
            .collect()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = RepresentClient::with_config(EmbedConfig::default()).unwrap();
        assert_eq!(c.model(), "ArcFace");
        assert_eq!(c.dimension(), 512);
    }

    #[test]
    fn model_selects_dimension() {
        let c =
            RepresentClient::with_config(EmbedConfig::default().with_model("Facenet")).unwrap();
        assert_eq!(c.dimension(), 128);
    }

    #[test]
    fn unknown_model_rejected() {
        let err = RepresentClient::with_config(EmbedConfig::default().with_model("Bogus"))
            .unwrap_err();
        assert!(matches!(err, EmbedError::UnknownModel(_)));
    }

    #[test]
    fn empty_bytes_rejected() {
        let c = RepresentClient::with_config(EmbedConfig::default()).unwrap();
        let err = c.encode_image(&ImageInput::bytes(vec![])).unwrap_err();
        assert!(matches!(err, EmbedError::InvalidImage(_)));
    }

    #[test]
    fn data_uri_encoding() {
        let uri = to_data_uri(&[0xFF, 0xD8, 0xFF]);
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn no_face_error_detection() {
        assert!(is_no_face_error(
            "Exception while representing: Face could not be detected in img."
        ));
        assert!(is_no_face_error("No face found"));
        assert!(!is_no_face_error("invalid base64"));
    }
}
