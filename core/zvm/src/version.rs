//! Version precedence.
//!
//! Identifiers are ordered by their numeric core when both sides have one.
//! A core is two to four dot-separated numbers, with missing trailing
//! components read as zero, so `0.9` and `0.9.0` rank together below
//! `0.10.0`. Anything after the first `-` or `+` (pre-release, dev or build
//! suffix) is ignored for the numeric comparison and only breaks ties.
//! Identifiers without a numeric core, such as `master`, fall back to plain
//! ordinal string comparison.

use std::cmp::Ordering;

/// Compares two version identifiers by release precedence.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use zvm_core::version::compare_versions;
///
/// assert_eq!(compare_versions("0.12.0", "0.9.1"), Ordering::Greater);
/// assert_eq!(compare_versions("master", "0.12.0"), Ordering::Greater);
/// ```
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (numeric_core(a), numeric_core(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Sorts identifiers in descending precedence and removes duplicates.
pub fn sort_descending(ids: &mut Vec<String>) {
    ids.sort_by(|a, b| compare_versions(b, a));
    ids.dedup();
}

fn numeric_core(id: &str) -> Option<[u64; 4]> {
    let core = id.split(['-', '+']).next().unwrap_or(id);
    let mut parts = [0u64; 4];
    let mut count = 0;
    for part in core.split('.') {
        let digits = !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if count == parts.len() || !digits {
            return None;
        }
        parts[count] = part.parse().ok()?;
        count += 1;
    }
    (count >= 2).then_some(parts)
}
