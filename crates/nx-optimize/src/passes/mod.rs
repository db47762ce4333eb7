// Passes - the reducer engine and the static import resolution it drives

pub mod import;
pub mod reduce;

pub use import::*;
pub use reduce::*;
