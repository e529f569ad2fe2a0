//! Binary search for insertion points in sorted index lists.
//!
//! Index lists hold IDs, not values, so every function takes a key accessor
//! that maps an element to its sort value. Equal values are kept in
//! insertion order: a new element always lands after the existing run of
//! equal values.

use std::cmp::Ordering;

/// Windows this small are scanned linearly instead of split again.
const LINEAR_WINDOW: usize = 3;

/// Find the position after which `target` belongs in `list`.
///
/// Returns the index of the last element whose key is `<= target`, or
/// `None` when `target` sorts before every element (including the empty
/// list), meaning the new element is prepended.
///
/// On an exact hit the search walks forward from the probe to the end of
/// the equal-value run, so runs of duplicates cost a linear scan only over
/// the run itself.
pub fn bisect_anchor<T, K, F>(list: &[T], target: &K, key: F) -> Option<usize>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    if list.is_empty() {
        return None;
    }

    // Invariant: the anchor is in lo..=hi, or there is none and lo == 0.
    let mut lo = 0;
    let mut hi = list.len() - 1;
    loop {
        if hi - lo < LINEAR_WINDOW {
            return (lo..=hi).rev().find(|&i| key(&list[i]) <= *target);
        }
        let mid = lo + (hi - lo) / 2;
        match key(&list[mid]).cmp(target) {
            Ordering::Less => lo = mid,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Some(run_end(list, mid, target, &key)),
        }
    }
}

fn run_end<T, K, F>(list: &[T], mut at: usize, target: &K, key: &F) -> usize
where
    K: Ord,
    F: Fn(&T) -> K,
{
    while at + 1 < list.len() && key(&list[at + 1]) == *target {
        at += 1;
    }
    at
}

/// Index at which `target` should be inserted to keep `list` sorted.
pub fn insertion_index<T, K, F>(list: &[T], target: &K, key: F) -> usize
where
    K: Ord,
    F: Fn(&T) -> K,
{
    bisect_anchor(list, target, key).map_or(0, |i| i + 1)
}

/// Insert `element` at its sorted position, after any equal-keyed run.
pub fn insert_sorted<T, K, F>(list: &mut Vec<T>, element: T, key: F)
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let target = key(&element);
    let at = insertion_index(list.as_slice(), &target, &key);
    list.insert(at, element);
}
