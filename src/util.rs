//! Small id-slice helpers shared by the mesh logic.

use std::collections::HashSet;

/// Returns the ids present in both `first` and `second`, preserving the
/// order of `second`.
pub fn intersection(first: &[String], second: &[String]) -> Vec<String> {
    let lookup: HashSet<&str> = first.iter().map(String::as_str).collect();
    second
        .iter()
        .filter(|id| lookup.contains(id.as_str()))
        .cloned()
        .collect()
}
