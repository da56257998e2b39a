//! Offline biography generation.
//!
//! Mirrors the remote pipeline end to end without leaving the machine: a
//! deterministic narrative is composed from the images and their
//! annotations, paginated, rendered to PDF, and paired with a card
//! thumbnail. The orchestrator switches to this pipeline when the remote
//! service stops answering.

mod layout;
mod narrative;
mod pdf;
mod thumbnail;

pub use thumbnail::compose_thumbnail;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::images::ImagePayload;
use crate::models::Annotation;

/// Badge drawn on thumbnails of offline-generated biographies.
pub const OFFLINE_BADGE: &str = "Generated offline";

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("failed to process image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to render document: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("I/O failure during rendering: {0}")]
    Io(#[from] std::io::Error),
}

/// Finished artifacts for one biography.
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub narrative: String,
    pub document: Vec<u8>,
    pub thumbnail: Vec<u8>,
}

/// Produces complete biography artifacts without a remote service.
pub trait BiographyGenerator: Send + Sync {
    fn generate(
        &self,
        title: &str,
        requirements: &str,
        images: &[ImagePayload],
        annotations: &[Annotation],
        generated_at: DateTime<Utc>,
    ) -> Result<GeneratedArtifact, GeneratorError>;
}

/// The built-in offline generator.
#[derive(Debug, Default)]
pub struct LocalBiographyGenerator;

impl BiographyGenerator for LocalBiographyGenerator {
    fn generate(
        &self,
        title: &str,
        requirements: &str,
        images: &[ImagePayload],
        annotations: &[Annotation],
        generated_at: DateTime<Utc>,
    ) -> Result<GeneratedArtifact, GeneratorError> {
        let narrative = narrative::compose_narrative(requirements, images, annotations, generated_at);
        let document = pdf::render_document(&narrative, images.first(), generated_at)?;
        let thumbnail = thumbnail::compose_thumbnail(images.first(), title, Some(OFFLINE_BADGE))?;
        Ok(GeneratedArtifact {
            narrative,
            document,
            thumbnail,
        })
    }
}
