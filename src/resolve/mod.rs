//! End-to-end resolution of protected streams

pub mod orchestrator;

pub use orchestrator::{Resolution, ResolutionOrchestrator};
