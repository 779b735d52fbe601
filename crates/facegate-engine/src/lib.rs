//! Runs a [`facegate_core::FaceVerifier`] on a dedicated thread behind a
//! cloneable async handle, so request handlers never block on image work.

pub mod config;
pub mod engine;

pub use config::EngineConfig;
pub use engine::{spawn_engine, EngineError, EngineHandle};
