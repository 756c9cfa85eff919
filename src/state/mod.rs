/// State management module
///
/// This module handles the gallery's data side:
/// - Shared data structures and route parsing (data.rs)
/// - Entry retrieval, filtering and pagination (source.rs)
/// - The infinite-scroll state machine (loader.rs)

pub mod data;
pub mod loader;
pub mod source;
