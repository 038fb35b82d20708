//! Variant selection for manifests

pub mod comparator;
pub mod selector;

pub use comparator::{Comparator, compare_by, stable_sort_by_comparators};
pub use selector::{Selection, SelectionPolicy, select};
