//! Collection aliases used throughout the crate.
//!
//! All hot-path lookups key on small integer ids owned by the tessellation,
//! so the non-cryptographic `rustc_hash` hashers are safe and markedly faster
//! than the default SipHash. Scratch buffers that usually stay small use
//! `smallvec` to avoid heap traffic in the common case.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Optimized `HashMap` for internal, trusted keys.
///
/// # Security Warning
///
/// Not DoS-resistant: only use with ids generated by this crate, never with
/// attacker-controlled keys.
pub type FastHashMap<K, V> = FxHashMap<K, V>;

/// Optimized `HashSet` counterpart of [`FastHashMap`].
pub type FastHashSet<K> = FxHashSet<K>;

/// Stack-allocated buffer that spills to the heap above `N` elements.
///
/// Used for one-ring walks, containing-simplex lists and face polygon
/// buffers, which are almost always small.
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

/// Compact index of a vertex slot within a simplex.
///
/// A `D`-dimensional simplex has `D + 1` slots, so a `u8` is always wide
/// enough while keeping the reciprocal-index tables dense.
pub type SlotIndex = u8;
