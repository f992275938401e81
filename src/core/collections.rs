//! Collection aliases tuned for the mesh algorithms.
//!
//! Keys are never attacker-controlled, so the non-cryptographic `FxHasher`
//! is used throughout, and the short-lived buffers of the flip and ring-walk
//! code stay on the stack via `SmallVec`.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Fast non-cryptographic hash set for visited-key tracking.
pub type FastHashSet<K> = FxHashSet<K>;

/// Stack-allocated buffer for small, bounded collections (flip results,
/// candidate faces, ring fragments).
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;
