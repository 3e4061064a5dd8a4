//! Cache Module
//!
//! Key derivation, namespace layout, and the backend-agnostic cache engine
//! with approximate LRU eviction and tag-scoped purge.

pub mod key;
mod store;


// Re-export public types
pub use key::{namespace, purge_pattern, ArgSlice, CallArgs, KeyBuilder, TagSpec, UNTAGGED_SEGMENT};
pub use store::{FnCache, MAX_EVICTION_BATCH};
