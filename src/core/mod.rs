// Public modules
pub mod error;
pub mod executor;
pub mod project;
pub mod ssh;
pub mod unicorn;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
