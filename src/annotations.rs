//! Sequences the user through one annotation prompt per image.
//!
//! The collector walks the image set in order. Each image is either
//! answered (both fields non-empty after trimming) or skipped; skipped
//! images still produce an entry so the finished set always has one
//! annotation per image, in input order.

use std::path::{Path, PathBuf};

use crate::images::ImagePayload;
use crate::models::Annotation;

/// What the collector is currently asking about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationPrompt<'a> {
    /// 0-based position of this image.
    pub index: usize,
    /// Total number of images in the session.
    pub total: usize,
    pub image_id: &'a str,
    pub image_path: &'a Path,
}

/// Stateful walk over the image set, one prompt at a time.
pub struct AnnotationCollector {
    images: Vec<(String, PathBuf)>,
    collected: Vec<Annotation>,
}

impl AnnotationCollector {
    pub fn new(images: &[ImagePayload]) -> Self {
        Self {
            images: images
                .iter()
                .map(|p| (p.id.clone(), p.path.clone()))
                .collect(),
            collected: Vec::with_capacity(images.len()),
        }
    }

    /// The image awaiting an answer, or `None` once every image has one.
    pub fn current(&self) -> Option<AnnotationPrompt<'_>> {
        self.images
            .get(self.collected.len())
            .map(|(id, path)| AnnotationPrompt {
                index: self.collected.len(),
                total: self.images.len(),
                image_id: id,
                image_path: path,
            })
    }

    pub fn is_complete(&self) -> bool {
        self.collected.len() == self.images.len()
    }

    /// Record an answer for the current image and advance.
    ///
    /// Both fields must be non-empty after trimming; otherwise nothing is
    /// recorded and the collector stays on the same image. Returns whether
    /// it advanced.
    pub fn answer(&mut self, time_period: &str, activity: &str) -> bool {
        let Some((id, path)) = self.images.get(self.collected.len()) else {
            return false;
        };
        let time_period = time_period.trim();
        let activity = activity.trim();
        if time_period.is_empty() || activity.is_empty() {
            return false;
        }
        self.collected.push(Annotation {
            image_id: id.clone(),
            image_path: path.clone(),
            time_period: time_period.to_string(),
            activity: activity.to_string(),
            is_completed: true,
        });
        true
    }

    /// Skip the current image, recording an empty entry, and advance.
    pub fn skip(&mut self) {
        if let Some((id, path)) = self.images.get(self.collected.len()) {
            self.collected.push(Annotation::skipped(id.clone(), path.clone()));
        }
    }

    /// The ordered annotation set collected so far, one entry per image
    /// already answered or skipped.
    pub fn into_annotations(self) -> Vec<Annotation> {
        self.collected
    }
}
