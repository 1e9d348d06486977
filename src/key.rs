//! Atomic keys and key collections.
//!
//! A [`Key`] is one element of a key path. Primitive variants compare by
//! value; [`Key::Ref`] compares by the identity of the referenced allocation
//! and never by its contents.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

// =============================================================================
// Reference keys
// =============================================================================

/// Identity key for a shared object.
///
/// Only a [`Weak`] handle is held, so a `RefKey` never keeps the referent's
/// value alive. The backing allocation itself stays reserved for as long as a
/// handle exists, which is what keeps the address (and therefore the identity)
/// from being handed to another object.
#[derive(Clone)]
pub struct RefKey {
    target: Weak<dyn Any + Send + Sync>,
}

impl RefKey {
    /// Create an identity key for the object behind `arc`.
    pub fn new<T: Any + Send + Sync>(arc: &Arc<T>) -> Self {
        let target: Weak<T> = Arc::downgrade(arc);
        Self { target }
    }

    /// Address of the referenced allocation. Stable for the key's lifetime.
    #[inline]
    pub fn addr(&self) -> usize {
        Weak::as_ptr(&self.target) as *const () as usize
    }

    /// Whether the referent is still owned by someone.
    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    pub fn upgrade(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.target.upgrade()
    }

    /// Upgrade and downcast to the concrete referent type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.upgrade()?.downcast::<T>().ok()
    }

    /// Whether this key identifies the object behind `arc`.
    pub fn refers_to<T: Any + Send + Sync>(&self, arc: &Arc<T>) -> bool {
        self.addr() == Arc::as_ptr(arc) as *const () as usize
    }
}

impl PartialEq for RefKey {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for RefKey {}

impl Hash for RefKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefKey({:#x})", self.addr())
    }
}

// =============================================================================
// Atomic keys
// =============================================================================

/// One atomic element of a key path.
#[derive(Clone, Debug)]
pub enum Key {
    Null,
    Bool(bool),
    Int(i128),
    /// `-0.0` equals `0.0` and every NaN equals every other NaN.
    Float(f64),
    Char(char),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    Ref(RefKey),
}

impl Key {
    /// Identity key for the object behind `arc`.
    pub fn by_ref<T: Any + Send + Sync>(arc: &Arc<T>) -> Self {
        Key::Ref(RefKey::new(arc))
    }

    #[inline]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Key::Ref(_))
    }

    pub fn as_ref_key(&self) -> Option<&RefKey> {
        match self {
            Key::Ref(r) => Some(r),
            _ => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Key::Null => 0,
            Key::Bool(_) => 1,
            Key::Int(_) => 2,
            Key::Float(_) => 3,
            Key::Char(_) => 4,
            Key::Str(_) => 5,
            Key::Bytes(_) => 6,
            Key::Ref(_) => 7,
        }
    }

    /// Total order over keys: variant tag first, then value.
    ///
    /// Reference keys fall back to address order here; canonical paths order
    /// them by ordinal instead (see `normalize`).
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Null, Key::Null) => Ordering::Equal,
            (Key::Bool(a), Key::Bool(b)) => a.cmp(b),
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Float(a), Key::Float(b)) => canonical_float(*a).total_cmp(&canonical_float(*b)),
            (Key::Char(a), Key::Char(b)) => a.cmp(b),
            (Key::Str(a), Key::Str(b)) => a.cmp(b),
            (Key::Bytes(a), Key::Bytes(b)) => a.cmp(b),
            (Key::Ref(a), Key::Ref(b)) => a.addr().cmp(&b.addr()),
            _ => self.tag().cmp(&other.tag()),
        }
    }
}

#[inline]
fn canonical_float(f: f64) -> f64 {
    if f.is_nan() {
        f64::NAN
    } else if f == 0.0 {
        0.0
    } else {
        f
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.total_cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        match self {
            Key::Null => {}
            Key::Bool(b) => b.hash(state),
            Key::Int(i) => i.hash(state),
            Key::Float(f) => canonical_float(*f).to_bits().hash(state),
            Key::Char(c) => c.hash(state),
            Key::Str(s) => s.hash(state),
            Key::Bytes(b) => b.hash(state),
            Key::Ref(r) => r.hash(state),
        }
    }
}

impl From<()> for Key {
    fn from(_: ()) -> Self {
        Key::Null
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}

macro_rules! key_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                fn from(i: $t) -> Self {
                    Key::Int(i as i128)
                }
            }
        )*
    };
}

key_from_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

impl From<f32> for Key {
    fn from(f: f32) -> Self {
        Key::Float(f as f64)
    }
}

impl From<f64> for Key {
    fn from(f: f64) -> Self {
        Key::Float(f)
    }
}

impl From<char> for Key {
    fn from(c: char) -> Self {
        Key::Char(c)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(Arc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for Key {
    fn from(s: Arc<str>) -> Self {
        Key::Str(s)
    }
}

impl From<&[u8]> for Key {
    fn from(b: &[u8]) -> Self {
        Key::Bytes(Arc::from(b))
    }
}

impl From<Vec<u8>> for Key {
    fn from(b: Vec<u8>) -> Self {
        Key::Bytes(Arc::from(b))
    }
}

impl<T: Any + Send + Sync> From<&Arc<T>> for Key {
    fn from(arc: &Arc<T>) -> Self {
        Key::by_ref(arc)
    }
}

impl From<RefKey> for Key {
    fn from(r: RefKey) -> Self {
        Key::Ref(r)
    }
}

impl<T: Into<Key>> From<Option<T>> for Key {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Key::Null, Into::into)
    }
}

// =============================================================================
// Key collections
// =============================================================================

/// A raw key collection as handed to the map, before normalization.
#[derive(Clone, Debug)]
pub enum KeySeq {
    /// Order is meaningful; duplicates are significant in position mode.
    Ordered(Vec<Key>),
    /// Set-shaped input. Rejected in position mode.
    Unordered(Vec<Key>),
}

impl KeySeq {
    pub fn is_unordered(&self) -> bool {
        matches!(self, KeySeq::Unordered(_))
    }

    pub fn into_vec(self) -> Vec<Key> {
        match self {
            KeySeq::Ordered(v) | KeySeq::Unordered(v) => v,
        }
    }
}

/// Conversion into a raw key collection.
///
/// Sequences (slices, arrays, vectors) are ordered; hash sets are not.
pub trait IntoKeySeq {
    fn into_key_seq(self) -> KeySeq;
}

impl IntoKeySeq for KeySeq {
    fn into_key_seq(self) -> KeySeq {
        self
    }
}

impl IntoKeySeq for Vec<Key> {
    fn into_key_seq(self) -> KeySeq {
        KeySeq::Ordered(self)
    }
}

impl IntoKeySeq for &Vec<Key> {
    fn into_key_seq(self) -> KeySeq {
        KeySeq::Ordered(self.clone())
    }
}

impl IntoKeySeq for &[Key] {
    fn into_key_seq(self) -> KeySeq {
        KeySeq::Ordered(self.to_vec())
    }
}

impl<const N: usize> IntoKeySeq for [Key; N] {
    fn into_key_seq(self) -> KeySeq {
        KeySeq::Ordered(Vec::from(self))
    }
}

impl<const N: usize> IntoKeySeq for &[Key; N] {
    fn into_key_seq(self) -> KeySeq {
        KeySeq::Ordered(self.to_vec())
    }
}

impl<S> IntoKeySeq for HashSet<Key, S> {
    fn into_key_seq(self) -> KeySeq {
        KeySeq::Unordered(self.into_iter().collect())
    }
}

impl<S> IntoKeySeq for &HashSet<Key, S> {
    fn into_key_seq(self) -> KeySeq {
        KeySeq::Unordered(self.iter().cloned().collect())
    }
}
