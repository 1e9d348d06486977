//! Canonical key paths.
//!
//! Position mode keeps the caller's sequence as is. Value mode collapses
//! duplicates and sorts: primitives by [`Key::total_cmp`], then reference
//! keys by their first-seen ordinal, so any permutation of the same key set
//! lands on the same path.

use std::collections::HashSet;

use smallvec::SmallVec;
use tracing::debug;

use crate::config::KeyMode;
use crate::error::{Error, Result};
use crate::identity::Ordinals;
use crate::key::{Key, KeySeq};

/// A canonical key path. Most memoized calls take only a few arguments.
pub(crate) type Path = SmallVec<[Key; 4]>;

/// Normalize `keys` for `mode`.
///
/// Returns `Ok(None)` when a reference key has no ordinal in `ordinals`; with
/// a lookup-only source that means the path was never written.
pub(crate) fn normalize<O: Ordinals>(
    mode: KeyMode,
    keys: KeySeq,
    mut ordinals: O,
) -> Result<Option<Path>> {
    match mode {
        KeyMode::Position => match keys {
            KeySeq::Ordered(keys) => Ok(Some(Path::from_vec(keys))),
            KeySeq::Unordered(_) => {
                debug!("rejected unordered key collection in position mode");
                Err(Error::InvalidInput(
                    "unordered key collection not supported in position mode",
                ))
            }
        },
        KeyMode::Value => {
            let mut seen: HashSet<Key> = HashSet::new();
            let mut primitives: Path = SmallVec::new();
            let mut refs: SmallVec<[(u64, Key); 2]> = SmallVec::new();

            for key in keys.into_vec() {
                if !seen.insert(key.clone()) {
                    continue;
                }
                match &key {
                    Key::Ref(r) => match ordinals.ordinal(r) {
                        Some(ord) => refs.push((ord, key)),
                        None => return Ok(None),
                    },
                    _ => primitives.push(key),
                }
            }

            primitives.sort_unstable_by(Key::total_cmp);
            refs.sort_unstable_by_key(|(ord, _)| *ord);
            primitives.extend(refs.into_iter().map(|(_, key)| key));
            Ok(Some(primitives))
        }
    }
}
