//! Delta computation logic.
//!
//! A delta run backs up exactly the references that are absent from the
//! baseline manifest. Comparison is byte-for-byte on the reference string;
//! there is no digest or host normalisation.

use std::collections::BTreeSet;

/// Compute `current - baseline`.
///
/// # Example
/// ```
/// use harbor_backup::sync::delta::compute_delta;
/// use std::collections::BTreeSet;
///
/// let current: BTreeSet<String> = ["h/lib/app@sha256:aaa", "h/lib/app@sha256:bbb"]
///     .into_iter().map(String::from).collect();
/// let baseline: BTreeSet<String> = ["h/lib/app@sha256:aaa"]
///     .into_iter().map(String::from).collect();
///
/// let delta = compute_delta(&current, &baseline);
/// assert_eq!(delta.into_iter().collect::<Vec<_>>(), vec!["h/lib/app@sha256:bbb"]);
/// ```
pub fn compute_delta(current: &BTreeSet<String>, baseline: &BTreeSet<String>) -> BTreeSet<String> {
    current.difference(baseline).cloned().collect()
}

/// Share of the current set that needs to be transferred (0.0 - 1.0).
pub fn delta_ratio(delta_len: usize, current_len: usize) -> f64 {
    if current_len == 0 {
        return 0.0;
    }
    delta_len as f64 / current_len as f64
}
