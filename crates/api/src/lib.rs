//! Slide generation HTTP service library.
//!
//! Exposes configuration, state, error handling, routes and background
//! tasks so the two binaries and the integration tests share one router
//! construction.

pub mod background;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
