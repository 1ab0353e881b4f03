// SPDX-License-Identifier: MIT

use super::*;
use proptest::prelude::*;

#[test]
fn major_minor_patch_ordering() {
    assert_eq!(compare_versions("1.0.0", "2.0.0"), Ordering::Less);
    assert_eq!(compare_versions("1.2.0", "1.1.9"), Ordering::Greater);
    assert_eq!(compare_versions("1.2.3", "1.2.3"), Ordering::Equal);
    assert_eq!(compare_versions("1.2.4", "1.2.3"), Ordering::Greater);
}

#[test]
fn release_outranks_prerelease() {
    assert_eq!(compare_versions("1.0.0", "1.0.0-alpha"), Ordering::Greater);
    assert_eq!(compare_versions("1.0.0-alpha", "1.0.0"), Ordering::Less);
}

#[test]
fn prerelease_numeric_identifiers_compare_numerically() {
    assert_eq!(compare_versions("1.0.0-alpha.2", "1.0.0-alpha.10"), Ordering::Less);
    assert_eq!(compare_versions("1.0.0-alpha.10", "1.0.0-alpha.2"), Ordering::Greater);
}

#[test]
fn prerelease_non_numeric_identifiers_compare_lexicographically() {
    assert_eq!(compare_versions("1.0.0-alpha", "1.0.0-beta"), Ordering::Less);
}

#[test]
fn prerelease_with_more_fields_outranks_prefix() {
    assert_eq!(compare_versions("1.0.0-alpha.1", "1.0.0-alpha"), Ordering::Greater);
}

#[test]
fn build_metadata_is_ignored() {
    assert_eq!(compare_versions("1.0.0+build1", "1.0.0+build2"), Ordering::Equal);
}

#[test]
fn non_semver_shaped_falls_back_to_string_compare() {
    assert_eq!(compare_versions("latest", "stable"), "latest".cmp("stable"));
    assert_eq!(compare_versions("1.0", "1.0.0"), "1.0".cmp("1.0.0"));
}

proptest! {
    #[test]
    fn comparator_is_reflexive(major in 0u64..50, minor in 0u64..50, patch in 0u64..50) {
        let v = format!("{major}.{minor}.{patch}");
        prop_assert_eq!(compare_versions(&v, &v), Ordering::Equal);
    }

    #[test]
    fn comparator_is_antisymmetric(
        a_major in 0u64..10, a_minor in 0u64..10, a_patch in 0u64..10,
        b_major in 0u64..10, b_minor in 0u64..10, b_patch in 0u64..10,
    ) {
        let a = format!("{a_major}.{a_minor}.{a_patch}");
        let b = format!("{b_major}.{b_minor}.{b_patch}");
        prop_assert_eq!(compare_versions(&a, &b), compare_versions(&b, &a).reverse());
    }
}
