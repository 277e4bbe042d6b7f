//! External translation cache.
//!
//! The external cache is shared by every record instance and, depending on
//! the store, by every process. It sits between the object-local cache of a
//! [`TranslatableRecord`](parlance_core::TranslatableRecord) and the backing
//! store.
//!
//! # Key Scoping
//!
//! Keys are built through [`TranslationCacheKey`], which always carries the
//! configured prefix. Deployments sharing one store under different
//! prefixes never read each other's entries.
//!
//! # Entry States
//!
//! A slot is absent, a [`CacheEntry::Translation`] or a
//! [`CacheEntry::NeedsFallback`] marker. See [`fallback`] for how markers
//! are written and honoured.

pub mod entry;
pub mod fallback;
pub mod key;
pub mod lmdb_backend;
pub mod memory;
pub mod traits;
pub mod translation_cache;

pub use entry::CacheEntry;
pub use fallback::cache_translation_needs_fallback;
pub use key::{get_translation_cache_key, TranslationCacheKey};
pub use lmdb_backend::{LmdbCacheError, LmdbCacheStore};
pub use memory::InMemoryCacheStore;
pub use traits::{CacheStats, TranslationCacheStore};
pub use translation_cache::TranslationCache;
