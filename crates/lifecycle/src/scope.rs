//! Scope resolution: does a package's auto-install scope include this machine?

use crate::types::{GroupId, Package};
use std::collections::BTreeSet;

/// Groups the local machine belongs to, snapshotted once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMembership {
    groups: BTreeSet<GroupId>,
}

impl GroupMembership {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<GroupId>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// True when any of `groups` is one of ours.
    pub fn intersects(&self, groups: &BTreeSet<GroupId>) -> bool {
        groups.iter().any(|g| self.groups.contains(g))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }
}

/// Whether `package` should be auto-installed on a machine with `membership`.
///
/// Exclusion always wins over inclusion.
pub fn in_scope(package: &Package, membership: &GroupMembership) -> bool {
    membership.intersects(&package.auto_install_groups)
        && !membership.intersects(&package.excluded_groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edition, PackageStatus, Scripts};

    fn package(auto: &[&str], excluded: &[&str]) -> Package {
        Package {
            basename: "app".to_string(),
            edition: Edition::new(1, 0),
            status: PackageStatus::Live,
            file_name: "app.pkg".to_string(),
            needs_reboot: false,
            uninstallable: false,
            auto_install_groups: auto.iter().map(|s| (*s).to_string()).collect(),
            excluded_groups: excluded.iter().map(|s| (*s).to_string()).collect(),
            expiration_days: None,
            expiration_path: None,
            receipt_ids: Vec::new(),
            scripts: Scripts::default(),
        }
    }

    #[test]
    fn test_member_of_auto_install_group() {
        let pkg = package(&["staff"], &[]);
        assert!(in_scope(&pkg, &GroupMembership::new(["staff", "lab"])));
    }

    #[test]
    fn test_not_member_of_any_auto_install_group() {
        let pkg = package(&["staff"], &[]);
        assert!(!in_scope(&pkg, &GroupMembership::new(["lab"])));
    }

    #[test]
    fn test_empty_membership_is_never_in_scope() {
        let pkg = package(&["staff"], &[]);
        assert!(!in_scope(&pkg, &GroupMembership::default()));
    }

    #[test]
    fn test_no_auto_install_groups_is_never_in_scope() {
        let pkg = package(&[], &[]);
        assert!(!in_scope(&pkg, &GroupMembership::new(["staff"])));
    }

    #[test]
    fn test_exclusion_dominates_inclusion() {
        let pkg = package(&["staff", "lab"], &["kiosk"]);
        assert!(!in_scope(&pkg, &GroupMembership::new(["staff", "kiosk"])));
        assert!(!in_scope(&pkg, &GroupMembership::new(["lab", "kiosk"])));
    }

    #[test]
    fn test_exclusion_of_unrelated_group_does_not_apply() {
        let pkg = package(&["staff"], &["kiosk"]);
        assert!(in_scope(&pkg, &GroupMembership::new(["staff", "lab"])));
    }

    #[test]
    fn test_excluded_only_is_out_of_scope() {
        let pkg = package(&["staff"], &["kiosk"]);
        assert!(!in_scope(&pkg, &GroupMembership::new(["kiosk"])));
    }

    #[test]
    fn test_same_group_in_both_lists_is_excluded() {
        let pkg = package(&["staff"], &["staff"]);
        assert!(!in_scope(&pkg, &GroupMembership::new(["staff"])));
    }
}
