//! Two-pointer merge of remote and internal member ids.

use std::cmp::Ordering;

use crate::server::error::verify::VerifyError;

/// Classification of one page of member ids.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeDiff {
    /// In both lists; the member stays verified.
    pub matched: Vec<i64>,
    /// Only on the remote page; needs a profile lookup.
    pub remote_only: Vec<i64>,
    /// Only internal; absent from the guild once the scan confirms it.
    pub internal_only: Vec<i64>,
    /// Pointer comparisons performed; bounded by `remote.len() + internal.len()`.
    pub comparisons: usize,
}

/// Merges two strictly ascending id lists in one linear pass.
///
/// # Arguments
/// - `remote` - Ids on the remote page
/// - `internal` - Internal ids in the same id range as the page
///
/// # Returns
/// - `Ok(MergeDiff)` - Every id classified exactly once
/// - `Err(VerifyError::Unsorted)` - Either list is not strictly ascending
pub fn merge_diff(remote: &[i64], internal: &[i64]) -> Result<MergeDiff, VerifyError> {
    ensure_ascending(remote)?;
    ensure_ascending(internal)?;

    let mut diff = MergeDiff::default();
    let (mut r, mut i) = (0, 0);

    while r < remote.len() && i < internal.len() {
        diff.comparisons += 1;
        match remote[r].cmp(&internal[i]) {
            Ordering::Less => {
                diff.remote_only.push(remote[r]);
                r += 1;
            }
            Ordering::Greater => {
                diff.internal_only.push(internal[i]);
                i += 1;
            }
            Ordering::Equal => {
                diff.matched.push(remote[r]);
                r += 1;
                i += 1;
            }
        }
    }
    diff.remote_only.extend_from_slice(&remote[r..]);
    diff.internal_only.extend_from_slice(&internal[i..]);

    Ok(diff)
}

fn ensure_ascending(ids: &[i64]) -> Result<(), VerifyError> {
    match ids.windows(2).find(|pair| pair[0] >= pair[1]) {
        Some(pair) => Err(VerifyError::Unsorted {
            previous: pair[0],
            next: pair[1],
        }),
        None => Ok(()),
    }
}
