//! Coverage unit sets.
//!
//! A unit is the smallest measurable execution element of a target file
//! (a line or a branch), identified by a 0-based `u32` index.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// An ordered set of coverage unit indices.
///
/// Backed by a `BTreeSet` so iteration order is deterministic and merges
/// (set union) are commutative and idempotent regardless of the order in
/// which concurrently completing attempts are folded in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSet(BTreeSet<u32>);

impl UnitSet {
    /// Create an empty unit set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Insert a single unit. Returns `true` if the unit was new.
    pub fn insert(&mut self, unit: u32) -> bool {
        self.0.insert(unit)
    }

    /// Union `other` into this set in place.
    pub fn union_with(&mut self, other: &UnitSet) {
        self.0.extend(other.0.iter().copied());
    }

    /// Whether `unit` is in the set.
    #[must_use]
    pub fn contains(&self, unit: u32) -> bool {
        self.0.contains(&unit)
    }

    /// Number of units in the set.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.0.len() as u32
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Largest unit index in the set, if any.
    #[must_use]
    pub fn max_unit(&self) -> Option<u32> {
        self.0.iter().next_back().copied()
    }

    /// Units in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// How many units `other` would add to this set.
    #[must_use]
    pub fn count_new(&self, other: &UnitSet) -> u32 {
        other.0.difference(&self.0).count() as u32
    }
}

impl FromIterator<u32> for UnitSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_is_idempotent() {
        let mut a: UnitSet = [1, 2, 3].into_iter().collect();
        let b: UnitSet = [2, 3, 4].into_iter().collect();

        a.union_with(&b);
        let after_first = a.clone();
        a.union_with(&b);

        assert_eq!(a, after_first);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn test_union_is_commutative() {
        let a: UnitSet = [1, 5, 9].into_iter().collect();
        let b: UnitSet = [2, 5, 7].into_iter().collect();

        let mut ab = a.clone();
        ab.union_with(&b);
        let mut ba = b.clone();
        ba.union_with(&a);

        assert_eq!(ab, ba);
    }

    #[test]
    fn test_count_new() {
        let a: UnitSet = [0, 1, 2].into_iter().collect();
        let b: UnitSet = [2, 3, 4].into_iter().collect();

        assert_eq!(a.count_new(&b), 2);
        assert_eq!(a.count_new(&a), 0);
    }

    #[test]
    fn test_iteration_is_ordered() {
        let set: UnitSet = [9, 1, 4].into_iter().collect();
        let units: Vec<u32> = set.iter().collect();
        assert_eq!(units, vec![1, 4, 9]);
        assert_eq!(set.max_unit(), Some(9));
    }
}
