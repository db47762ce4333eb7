// Queries - stateless operations for extracting information

pub mod scope_queries;

pub use scope_queries::*;
