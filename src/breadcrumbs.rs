use std::{iter, option, vec};

use crate::protocol::Breadcrumb;

/// The number of breadcrumbs a scope keeps unless configured otherwise.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;

/// A helper trait that converts self into an Iterator of Breadcrumbs.
///
/// This is used for the [`add_breadcrumb`] function.
///
/// [`add_breadcrumb`]: crate::add_breadcrumb
pub trait IntoBreadcrumbs {
    /// The iterator type for the breadcrumbs.
    type Output: Iterator<Item = Breadcrumb>;

    /// This converts the object into an optional breadcrumb.
    fn into_breadcrumbs(self) -> Self::Output;
}

impl IntoBreadcrumbs for Breadcrumb {
    type Output = iter::Once<Breadcrumb>;

    fn into_breadcrumbs(self) -> Self::Output {
        iter::once(self)
    }
}

impl IntoBreadcrumbs for Vec<Breadcrumb> {
    type Output = vec::IntoIter<Breadcrumb>;

    fn into_breadcrumbs(self) -> Self::Output {
        self.into_iter()
    }
}

impl IntoBreadcrumbs for Option<Breadcrumb> {
    type Output = option::IntoIter<Breadcrumb>;

    fn into_breadcrumbs(self) -> Self::Output {
        self.into_iter()
    }
}

impl<F: FnOnce() -> I, I: IntoBreadcrumbs> IntoBreadcrumbs for F {
    type Output = I::Output;

    fn into_breadcrumbs(self) -> Self::Output {
        self().into_breadcrumbs()
    }
}

/// A bounded, ordered trail of breadcrumbs.
///
/// The trail is backed by a persistent vector: cloning it (which happens on
/// every scope push) shares structure with the parent, and appending to the
/// clone never shows up in the parent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BreadcrumbTrail {
    crumbs: im::Vector<Breadcrumb>,
}

impl BreadcrumbTrail {
    /// Creates an empty trail.
    pub fn new() -> BreadcrumbTrail {
        Default::default()
    }

    /// Appends a breadcrumb, dropping the oldest ones until at most
    /// `capacity` remain.
    ///
    /// Returns the number of evicted breadcrumbs.
    pub fn push(&mut self, breadcrumb: Breadcrumb, capacity: usize) -> usize {
        self.crumbs.push_back(breadcrumb);
        self.truncate_front(capacity)
    }

    /// Drops the oldest breadcrumbs until at most `capacity` remain.
    pub fn truncate_front(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.crumbs.len() > capacity {
            self.crumbs.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// The number of breadcrumbs in the trail.
    pub fn len(&self) -> usize {
        self.crumbs.len()
    }

    /// Returns `true` if the trail holds no breadcrumbs.
    pub fn is_empty(&self) -> bool {
        self.crumbs.is_empty()
    }

    /// Removes all breadcrumbs.
    pub fn clear(&mut self) {
        self.crumbs.clear();
    }

    /// Iterates the breadcrumbs oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Breadcrumb> + '_ {
        self.crumbs.iter()
    }

    /// The most recently added breadcrumb.
    pub fn last(&self) -> Option<&Breadcrumb> {
        self.crumbs.back()
    }
}

impl<'a> IntoIterator for &'a BreadcrumbTrail {
    type Item = &'a Breadcrumb;
    type IntoIter = im::vector::Iter<'a, Breadcrumb>;

    fn into_iter(self) -> Self::IntoIter {
        self.crumbs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crumb(message: &str) -> Breadcrumb {
        Breadcrumb {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    fn messages(trail: &BreadcrumbTrail) -> Vec<&str> {
        trail
            .iter()
            .map(|b| b.message.as_deref().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_trail_evicts_oldest_first() {
        let mut trail = BreadcrumbTrail::new();
        let mut evicted = 0;
        for i in 0..7 {
            evicted += trail.push(crumb(&i.to_string()), 3);
            assert!(trail.len() <= 3);
        }
        assert_eq!(evicted, 4);
        assert_eq!(messages(&trail), vec!["4", "5", "6"]);
        assert_eq!(trail.last().and_then(|b| b.message.as_deref()), Some("6"));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut trail = BreadcrumbTrail::new();
        trail.push(crumb("dropped"), 0);
        assert!(trail.is_empty());
    }

    #[test]
    fn test_clones_do_not_share_appends() {
        let mut parent = BreadcrumbTrail::new();
        parent.push(crumb("a"), DEFAULT_MAX_BREADCRUMBS);
        let mut child = parent.clone();
        child.push(crumb("b"), DEFAULT_MAX_BREADCRUMBS);
        parent.push(crumb("c"), DEFAULT_MAX_BREADCRUMBS);
        assert_eq!(messages(&parent), vec!["a", "c"]);
        assert_eq!(messages(&child), vec!["a", "b"]);
    }

    #[test]
    fn test_into_breadcrumbs_variants() {
        assert_eq!(crumb("x").into_breadcrumbs().count(), 1);
        assert_eq!(None::<Breadcrumb>.into_breadcrumbs().count(), 0);
        assert_eq!(vec![crumb("a"), crumb("b")].into_breadcrumbs().count(), 2);
        assert_eq!((|| Some(crumb("lazy"))).into_breadcrumbs().count(), 1);
    }
}
