//! Data models for memoirist.

mod annotation;
mod biography;
mod task;

pub use annotation::{upsert_annotation, Annotation};
pub use biography::Biography;
pub use task::{GenerationTask, TaskStatus};
