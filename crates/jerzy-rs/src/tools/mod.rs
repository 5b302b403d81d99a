//! Tool support for agents.
//!
//! - [`cache`]: [`ResultCache`](cache::ResultCache), a bounded FIFO cache of
//!   tool results with optional TTL, keyed by tool name and canonical
//!   arguments. Used by [`Agent::call_tool`](crate::agent::Agent::call_tool).

pub mod cache;

pub use cache::{ResultCache, cache_key};
