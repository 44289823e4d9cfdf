//! Uniform random selection over finite sequences
//!
//! Used for "play random sound" and "play random sound on tab".

use rand::Rng;

/// Pick a uniformly random element from a slice
///
/// Returns `None` for an empty slice.
pub fn pick<T>(items: &[T]) -> Option<&T> {
    pick_with(items, &mut rand::thread_rng())
}

/// Pick a uniformly random element using a caller-supplied generator
///
/// Deterministic generators make selection testable.
pub fn pick_with<'a, T, R: Rng>(items: &'a [T], rng: &mut R) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..items.len());
    items.get(index)
}
