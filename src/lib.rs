//! # composite-map
//!
//! A map keyed by whole sequences of values, for memoizing calls on their full
//! argument list without serializing the arguments into one key first.
//!
//! Keys may mix primitives (compared by value) and shared objects (compared by
//! identity, held weakly). Each key sequence becomes a path through a trie;
//! branches left empty by removals are pruned according to a
//! [`CleanupPolicy`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use composite_map::{keys, CompositeMap};
//!
//! let mut m: CompositeMap<u64> = CompositeMap::by_value();
//! let session = Arc::new("session");
//!
//! m.insert(keys!["user", 42, &session], 7).unwrap();
//!
//! // Value mode ignores argument order.
//! assert_eq!(m.get(keys![&session, 42, "user"]).unwrap(), Some(&7));
//!
//! m.remove(keys!["user", 42, &session]).unwrap();
//! assert_eq!(m.node_count(), 1);
//! ```
//!
//! ## Modes
//!
//! - [`KeyMode::Position`]: order and repetition matter; `[a, b]`, `[b, a]`
//!   and `[a, a, b]` are three different keys. Unordered collections are
//!   rejected with [`Error::InvalidInput`].
//! - [`KeyMode::Value`]: the key is the *set* of values. Duplicates collapse
//!   and order is ignored; hash sets are accepted.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod identity;
pub mod key;
mod map;
mod node;
mod normalize;
mod prune;
mod shared;

pub use config::{CleanupPolicy, Config, KeyMode};
pub use error::{Error, Result};
pub use identity::IdentityTable;
pub use key::{IntoKeySeq, Key, KeySeq, RefKey};
pub use map::{CompositeMap, Iter};
pub use shared::SharedMap;

/// Build a `Vec<Key>` from heterogeneous values.
///
/// Each element goes through `Key::from`; pass `&Arc<T>` for identity keys.
///
/// ```rust
/// use std::sync::Arc;
/// use composite_map::{keys, Key};
///
/// let obj = Arc::new(5u8);
/// let k = keys!["a", 1, 2.5, true, &obj];
/// assert_eq!(k.len(), 5);
/// assert_eq!(k[0], Key::from("a"));
/// ```
#[macro_export]
macro_rules! keys {
    () => {
        ::std::vec::Vec::<$crate::Key>::new()
    };
    ($($key:expr),+ $(,)?) => {
        ::std::vec![$($crate::Key::from($key)),+]
    };
}

#[cfg(test)]
mod proptests;
