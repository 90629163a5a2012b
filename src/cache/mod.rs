//! In-memory response cache
//!
//! Stores parsed responses keyed by effective URL with a fixed TTL. Expired
//! entries are not swept in the background; they are dropped lazily the next
//! time a lookup touches them.

mod store;

pub use store::{CachedData, ResponseCache};
