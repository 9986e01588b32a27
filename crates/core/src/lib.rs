//! Domain types and pure logic for the slide generation service.

pub mod error;
pub mod job;
pub mod job_events;
pub mod progress;
pub mod prompts;
pub mod settings;
pub mod types;
pub mod upload;
