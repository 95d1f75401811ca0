pub mod lite_set;
pub mod safe_hash_map;
pub mod tree_map;

pub use lite_set::LiteSet;
pub use safe_hash_map::{SafeHashMap, SafeHashMapConfig};
pub use tree_map::TreeMap;
