//! Collections shared across Halcyon crates.
//!
//! - `HashMap`/`HashSet` backed by AHash
//! - [`sparse_set::SparseSet`], a generational arena used for texture storage

pub mod sparse_set;

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};
