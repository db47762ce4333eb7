// nx-optimize: Static reduction of configuration-language expression trees
//
// Architecture:
// - passes: the reducer engine and static import resolution
// - queries: stateless operations for extracting information from trees
// - utils: the import cache shared by one reduction run
// - config: options controlling a reduction run

pub mod config;
pub mod error;
pub mod passes;
pub mod queries;
pub mod utils;

// Re-export key types for convenience
pub use config::*;
pub use passes::*;
pub use queries::*;
pub use utils::*;
