//! Key orderings.
//!
//! A tree is parameterised by a [`Comparator`] chosen at construction. The
//! comparator must describe a total order over every key the tree will see;
//! an inconsistent comparator will not cause memory unsafety, but lookups and
//! traversal order are then unspecified.

use std::cmp::Ordering;

/// A total order over keys of type `K`.
pub trait Comparator<K: ?Sized> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K: Ord + ?Sized> Comparator<K> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Orders keys by the reverse of their [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReverseOrder;

impl<K: Ord + ?Sized> Comparator<K> for ReverseOrder {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        b.cmp(a)
    }
}

impl<K: ?Sized, F> Comparator<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}
