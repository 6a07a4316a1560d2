//! Membership drift between desired and current project bindings.
//!
//! Members are compared by `(type, principal, role template)` only, so a
//! binding that already exists keeps its remote id and is never reissued.

use crate::types::{Member, MemberKey};
use std::collections::HashSet;

/// Bindings to create and remove to turn `current` into `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// Desired members with no matching current binding
    pub to_add: Vec<Member>,
    /// Current bindings with no matching desired member
    pub to_remove: Vec<Member>,
}

impl MembershipDiff {
    /// Check if membership already converged.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Total number of binding operations.
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// Compute the membership diff.
///
/// Output keeps input order. A key repeated in `desired` is added once; every
/// current binding whose key is not desired is removed, duplicates included.
pub fn diff_members(desired: &[Member], current: &[Member]) -> MembershipDiff {
    let current_keys: HashSet<MemberKey<'_>> = current.iter().map(Member::key).collect();
    let desired_keys: HashSet<MemberKey<'_>> = desired.iter().map(Member::key).collect();

    let mut seen = HashSet::new();
    let to_add = desired
        .iter()
        .filter(|m| !current_keys.contains(&m.key()) && seen.insert(m.key()))
        .cloned()
        .collect();

    let to_remove = current
        .iter()
        .filter(|m| !desired_keys.contains(&m.key()))
        .cloned()
        .collect();

    MembershipDiff { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev() -> Member {
        Member::group("openldap_group://cn=developers,ou=Groups,dc=example", "project-member")
    }

    fn qa() -> Member {
        Member::group("openldap_group://cn=testers,ou=Groups,dc=example", "rt-123")
    }

    fn owner() -> Member {
        Member::user("openldap_user://cn=canh,ou=People,dc=example", "project-owner")
    }

    fn keys(members: &[Member]) -> HashSet<MemberKey<'_>> {
        members.iter().map(Member::key).collect()
    }

    #[test]
    fn test_diff_empty_inputs() {
        let diff = diff_members(&[], &[]);
        assert!(diff.is_empty());
        assert_eq!(diff.len(), 0);
    }

    #[test]
    fn test_diff_all_new() {
        let desired = vec![dev(), owner()];
        let diff = diff_members(&desired, &[]);
        assert_eq!(diff.to_add, desired);
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn test_diff_all_removed() {
        let current = vec![dev().with_id("b-1"), qa().with_id("b-2")];
        let diff = diff_members(&[], &current);
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_remove.len(), 2);
        assert_eq!(diff.to_remove[0].id, "b-1");
        assert_eq!(diff.to_remove[1].id, "b-2");
    }

    #[test]
    fn test_diff_ignores_binding_id() {
        let desired = vec![dev()];
        let current = vec![dev().with_id("p-1:b-7")];
        assert!(diff_members(&desired, &current).is_empty());
    }

    #[test]
    fn test_diff_role_change_is_add_and_remove() {
        let desired = vec![Member::group(dev().principal_id, "project-owner")];
        let current = vec![dev().with_id("b-1")];
        let diff = diff_members(&desired, &current);
        assert_eq!(diff.to_add.len(), 1);
        assert_eq!(diff.to_add[0].role_template_id, "project-owner");
        assert_eq!(diff.to_remove.len(), 1);
        assert_eq!(diff.to_remove[0].id, "b-1");
    }

    #[test]
    fn test_diff_type_is_part_of_key() {
        let desired = vec![Member::user(dev().principal_id, "project-member")];
        let current = vec![dev().with_id("b-1")];
        let diff = diff_members(&desired, &current);
        assert_eq!(diff.len(), 2);
    }

    #[test]
    fn test_diff_mixed_keeps_input_order() {
        let desired = vec![qa(), dev(), owner()];
        let current = vec![
            Member::user("local://u-9", "project-member").with_id("b-9"),
            dev().with_id("b-1"),
            Member::user("local://u-8", "read-only").with_id("b-8"),
        ];
        let diff = diff_members(&desired, &current);
        assert_eq!(diff.to_add, vec![qa(), owner()]);
        let removed: Vec<&str> = diff.to_remove.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(removed, vec!["b-9", "b-8"]);
    }

    #[test]
    fn test_diff_duplicate_desired_added_once() {
        let desired = vec![dev(), dev()];
        let diff = diff_members(&desired, &[]);
        assert_eq!(diff.to_add.len(), 1);
    }

    #[test]
    fn test_diff_duplicate_current_both_removed() {
        let current = vec![qa().with_id("b-1"), qa().with_id("b-2")];
        let diff = diff_members(&[dev()], &current);
        assert_eq!(diff.to_remove.len(), 2);
    }

    #[test]
    fn test_diff_set_properties() {
        let desired = vec![dev(), qa()];
        let current = vec![qa().with_id("b-2"), owner().with_id("b-3")];
        let diff = diff_members(&desired, &current);

        let added = keys(&diff.to_add);
        let removed = keys(&diff.to_remove);
        let desired_keys = keys(&desired);
        let current_keys = keys(&current);

        assert!(added.is_disjoint(&current_keys));
        assert!(removed.is_disjoint(&desired_keys));

        let expected_added: HashSet<MemberKey<'_>> =
            desired_keys.difference(&current_keys).copied().collect();
        let expected_removed: HashSet<MemberKey<'_>> =
            current_keys.difference(&desired_keys).copied().collect();
        assert_eq!(added, expected_added);
        assert_eq!(removed, expected_removed);
    }
}
