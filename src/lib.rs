//! Client-side in-memory data model for a distributed cache.
//!
//! Four components compose the model:
//!
//! - [`map::safe_hash_map`] — a concurrent open-hash map with wait-free
//!   readers and serialized writers.
//! - [`map::tree_map`] — an AVL-balanced ordered map with navigable
//!   sub-map views.
//! - [`index::simple_map_index`] — a dual forward/inverse index over a
//!   map, built from a value extractor.
//! - [`listener`] — map-event listener registration and dispatch, with an
//!   optimization plan that avoids building events nobody is listening for.
//!
//! [`collections`] provides the shared container traits and converter/
//! singleton views these components are built on; [`filter`] and
//! [`processor`] provide the filter and entry-processor shapes §6 calls for.

pub mod collections;
pub mod error;
pub mod filter;
pub mod index;
pub mod listener;
pub mod map;
pub mod processor;

pub use error::{CacheError, Result};
pub use index::simple_map_index::{SimpleMapIndex, SimpleMapIndexConfig};
pub use map::safe_hash_map::{SafeHashMap, SafeHashMapConfig};
pub use map::tree_map::TreeMap;
