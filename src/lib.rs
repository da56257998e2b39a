//! Memoirist - personal biography generation from life-story photos.
//!
//! Takes a set of photos and a free-text description of what the story
//! should cover, submits them to a remote generation service, polls until
//! the document is ready, and persists the finished artifact locally.
//! When the service is unreachable the same pipeline runs offline through
//! a deterministic local generator.

pub mod annotations;
pub mod cli;
pub mod config;
pub mod generator;
pub mod images;
pub mod models;
pub mod orchestrator;
pub mod remote;
pub mod store;
