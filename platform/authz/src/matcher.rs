use crate::model::{AssignmentView, IsAuthorizedQuery, ScopeType};

/// Whether one assignment grants the queried action.
///
/// Names compare exactly; wildcards were already folded into the stored
/// expressions when the entitlement was created.
pub fn match_assignment(view: &AssignmentView, query: &IsAuthorizedQuery) -> bool {
    let Some(entitlement) = view.entitlement.as_ref() else {
        return false;
    };
    let assignment = &view.assignment;
    if let Some(action) = assignment.action_name.as_deref() {
        if action != query.action_name {
            return false;
        }
    }
    if let Some(resource) = assignment.resource_name.as_deref() {
        if resource != query.resource_name {
            return false;
        }
    }
    if entitlement.resource_id.is_none() {
        return true;
    }
    match view.resource_scope() {
        ScopeType::Domain => true,
        ScopeType::Org | ScopeType::Hierarchy => match view.effective_scope_ref() {
            None => true,
            Some(scope) => query.scope_ref.as_deref() == Some(scope),
        },
        ScopeType::Private | ScopeType::Other(_) => false,
    }
}
