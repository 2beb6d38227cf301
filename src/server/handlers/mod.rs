//! Handler module declarations and re-exports

pub mod jobs;
pub mod results;

// Re-export all handlers for convenient access
pub use jobs::*;
pub use results::*;
