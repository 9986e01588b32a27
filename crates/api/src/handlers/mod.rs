pub mod slides;
pub mod tasks;
