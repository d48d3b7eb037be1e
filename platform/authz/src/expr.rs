//! Entitlement expressions and set arithmetic over entitlement ids.

use std::collections::HashSet;
use std::hash::Hash;

pub const WILDCARD: &str = "*";

/// `{resource}:{action}`, with `*` standing in for a missing half.
pub fn compute_action_expr(resource: Option<&str>, action: Option<&str>) -> String {
    let resource = resource.filter(|r| !r.is_empty()).unwrap_or(WILDCARD);
    let action = action.filter(|a| !a.is_empty()).unwrap_or(WILDCARD);
    format!("{resource}:{action}")
}

/// The action expression narrowed to a scope reference, if any.
pub fn resolve_expr(action_expr: &str, scope_ref: Option<&str>) -> String {
    match scope_ref.filter(|s| !s.is_empty()) {
        Some(scope) => format!("{action_expr}@{scope}"),
        None => action_expr.to_string(),
    }
}

/// Ids to add and remove to turn `old` into `new`. Both keep input order.
pub fn diff_entitlement_ids<T>(old: &[T], new: &[T]) -> (Vec<T>, Vec<T>)
where
    T: Clone + Eq + Hash,
{
    let old_set: HashSet<&T> = old.iter().collect();
    let new_set: HashSet<&T> = new.iter().collect();
    let mut seen = HashSet::new();
    let added = new
        .iter()
        .filter(|id| !old_set.contains(id) && seen.insert(*id))
        .cloned()
        .collect();
    let mut seen = HashSet::new();
    let removed = old
        .iter()
        .filter(|id| !new_set.contains(id) && seen.insert(*id))
        .cloned()
        .collect();
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_expr_uses_wildcards() {
        assert_eq!(compute_action_expr(Some("invoice"), Some("approve")), "invoice:approve");
        assert_eq!(compute_action_expr(Some("invoice"), None), "invoice:*");
        assert_eq!(compute_action_expr(None, None), "*:*");
        assert_eq!(compute_action_expr(Some(""), Some("read")), "*:read");
    }

    #[test]
    fn resolved_expr_appends_scope() {
        assert_eq!(resolve_expr("invoice:read", Some("org-7")), "invoice:read@org-7");
        assert_eq!(resolve_expr("invoice:read", None), "invoice:read");
    }

    #[test]
    fn diff_reports_added_and_removed() {
        let (added, removed) = diff_entitlement_ids(&["a", "b"], &["b", "c"]);
        assert_eq!(added, vec!["c"]);
        assert_eq!(removed, vec!["a"]);
    }

    #[test]
    fn diff_from_empty_adds_everything() {
        let (added, removed) = diff_entitlement_ids::<&str>(&[], &["x"]);
        assert_eq!(added, vec!["x"]);
        assert!(removed.is_empty());
    }

    #[test]
    fn diff_ignores_duplicates() {
        let (added, removed) = diff_entitlement_ids(&[1, 1, 2], &[3, 3]);
        assert_eq!(added, vec![3]);
        assert_eq!(removed, vec![1, 2]);
    }
}
