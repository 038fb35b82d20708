//! Multi-criteria stable ordering

use std::cmp::Ordering;

/// One ranking criterion
pub type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Compare two items with `comparators` in priority order
///
/// The first comparator that distinguishes the pair decides.
pub fn compare_by<T>(a: &T, b: &T, comparators: &[Comparator<T>]) -> Ordering {
    comparators
        .iter()
        .map(|cmp| cmp(a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Sort `items` by `comparators`, keeping the input order of equal items
pub fn stable_sort_by_comparators<T>(items: &mut [T], comparators: &[Comparator<T>]) {
    // slice::sort_by is stable
    items.sort_by(|a, b| compare_by(a, b, comparators));
}
