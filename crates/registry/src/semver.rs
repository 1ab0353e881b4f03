// SPDX-License-Identifier: MIT

//! Semver-like version comparison (spec §4.2): majors, then minors, then
//! patches, then a prerelease comparator where absence outranks presence
//! and numeric identifiers compare numerically. Falls back to a plain
//! string compare when either side isn't semver-shaped.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SemVer {
    major: u64,
    minor: u64,
    patch: u64,
    prerelease: Vec<String>,
}

fn parse(version: &str) -> Option<SemVer> {
    let (core, prerelease) = match version.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (version, None),
    };
    // Strip build metadata from whichever half carries it.
    let core = core.split('+').next().unwrap_or(core);
    let prerelease = prerelease.map(|p| p.split('+').next().unwrap_or(p));

    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let prerelease =
        prerelease.map(|p| p.split('.').map(String::from).collect()).unwrap_or_default();

    Some(SemVer { major, minor, patch, prerelease })
}

fn compare_identifier(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

fn compare_prerelease(a: &[String], b: &[String]) -> Ordering {
    // No prerelease outranks having one, at equal major.minor.patch.
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    for (x, y) in a.iter().zip(b.iter()) {
        match compare_identifier(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Compare two version strings. Semver-shaped versions compare by the rules
/// above; otherwise falls back to a plain string compare.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => a
            .major
            .cmp(&b.major)
            .then(a.minor.cmp(&b.minor))
            .then(a.patch.cmp(&b.patch))
            .then_with(|| compare_prerelease(&a.prerelease, &b.prerelease)),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
#[path = "semver_tests.rs"]
mod tests;
