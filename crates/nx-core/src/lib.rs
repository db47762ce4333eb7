#[macro_use]
pub mod macros;

pub mod ast;
pub mod context;
pub mod error;
pub mod frontend;
pub mod span;
pub mod vfs;

// Re-export commonly used items for convenience
pub use tracing;

pub use frontend::{JsonFrontend, LanguageFrontend};

// Alias for error types
pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
