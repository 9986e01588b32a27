//! Document-to-slides generation chain.
//!
//! A hosted language model turns the uploaded documents plus a themed
//! instruction into Marp markdown; the Marp CLI renders that markdown into
//! PDF and HTML. [`SlideGenerator`] ties the two together behind the
//! [`ArtifactGenerator`] seam used by the dispatcher.

pub mod error;
pub mod gemini;
pub mod generator;
pub mod markdown;
pub mod marp;

pub use error::GenerateError;
pub use gemini::GeminiClient;
pub use generator::{ArtifactGenerator, SlideGenerator};
pub use marp::MarpRenderer;
