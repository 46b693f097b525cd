// gitvault-core/src/cache/mod.rs

pub mod authority_cache;

pub use authority_cache::{AuthorityCache, JsonFileStore, TextMapStore};
