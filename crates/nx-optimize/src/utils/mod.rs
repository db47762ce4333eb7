// Utils - shared state for a reduction run

pub mod import_cache;

pub use import_cache::*;
