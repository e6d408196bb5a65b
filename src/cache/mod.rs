//! Lookup cache for the content store.
//!
//! Sections, article listings and decoded articles are memoized against the
//! store version they were read at. A store change produces a new version, so
//! stale entries are never served; they simply age out of the LRU.
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 512
//! ```

mod accessor;
mod config;
mod keys;
mod lock;
mod store;

pub use accessor::Memoizer;
pub use config::CacheConfig;
pub use keys::{CacheKey, Lookup};
pub(crate) use lock::{rw_read, rw_write};
pub use store::{CacheBackend, Cacheable, CachedValue, LruCacheBackend};
