use entity::kinds::SubjectType;
use platform_api::{ClientError, FieldErrorKind, ValidationErrors};
use sea_orm::DatabaseConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Fault, ServiceResult};
use crate::matcher::match_assignment;
use crate::model::{
    AccessDecision, AssignmentView, IsAuthorizedQuery, PermissionSnapshot, ScopePermissions,
    Subject,
};
use crate::repo::{assignments, catalog};
use crate::subject::expand_subject;
use crate::validation::Validator;

/// Read-only authorization decisions.
#[derive(Clone)]
pub struct AuthorizeService {
    db: DatabaseConnection,
    validator: Validator,
}

impl AuthorizeService {
    pub fn new(db: DatabaseConnection, validator: Validator) -> Self {
        Self { db, validator }
    }

    /// `Allow` on the first assignment that matches, `Deny` otherwise.
    #[instrument(
        name = "authz.is_authorized",
        skip_all,
        fields(
            subject_type = ?query.subject_type,
            resource = %query.resource_name,
            action = %query.action_name,
        )
    )]
    pub async fn is_authorized(&self, query: IsAuthorizedQuery) -> ServiceResult<AccessDecision> {
        self.decide(&query)
            .await
            .map_err(|fault| fault.during("check authorization"))
    }

    async fn decide(&self, query: &IsAuthorizedQuery) -> Result<AccessDecision, Fault> {
        let mut errors = ValidationErrors::new();
        self.validator
            .name(&mut errors, "actionName", &query.action_name);
        self.validator
            .name(&mut errors, "resourceName", &query.resource_name);
        self.validator
            .name(&mut errors, "subjectRef", &query.subject_ref);
        self.validator
            .optional_name(&mut errors, "scopeRef", query.scope_ref.as_deref());
        errors.into_result()?;

        let resource = catalog::find_resource_by_name(&self.db, &query.resource_name)
            .await?
            .ok_or_else(|| {
                ClientError::field(
                    "resourceName",
                    FieldErrorKind::NotFound,
                    format!("resource {} does not exist", query.resource_name),
                )
            })?;
        catalog::find_action_by_name(&self.db, resource.id, &query.action_name)
            .await?
            .ok_or_else(|| {
                ClientError::field(
                    "actionName",
                    FieldErrorKind::NotFound,
                    format!(
                        "action {} does not exist on resource {}",
                        query.action_name, query.resource_name
                    ),
                )
            })?;

        let subject = Subject::new(query.subject_type, query.subject_ref.clone());
        let candidates = match query.subject_type {
            SubjectType::User | SubjectType::Group => vec![subject],
            _ => expand_subject(&self.db, subject).await?,
        };
        for candidate in &candidates {
            let views = assignments::find_views_by_subject(&self.db, candidate).await?;
            if let Some(hit) = views.iter().find(|view| match_assignment(view, query)) {
                tracing::debug!(
                    assignment_id = %hit.assignment.id,
                    via = %candidate.subject_ref,
                    "access allowed"
                );
                return Ok(AccessDecision::Allow);
            }
        }
        Ok(AccessDecision::Deny)
    }

    /// Everything the user may do, grouped by resource and scope.
    #[instrument(name = "authz.permission_snapshot", skip_all, fields(user_id = %user_id))]
    pub async fn permission_snapshot(&self, user_id: Uuid) -> ServiceResult<PermissionSnapshot> {
        self.snapshot(user_id)
            .await
            .map_err(|fault| fault.during("build permission snapshot"))
    }

    async fn snapshot(&self, user_id: Uuid) -> Result<PermissionSnapshot, Fault> {
        let mut errors = ValidationErrors::new();
        self.validator.id(&mut errors, "userId", user_id);
        errors.into_result()?;

        let subject = Subject::new(SubjectType::User, user_id.to_string());
        let views = assignments::find_views_by_subject(&self.db, &subject).await?;
        Ok(fold_snapshot(&views))
    }
}

/// Group views by (resource, scope type, scope ref) and collect their actions.
///
/// A view with no resource name on either the assignment or the entitlement
/// is skipped.
pub fn fold_snapshot(views: &[AssignmentView]) -> PermissionSnapshot {
    let mut snapshot = PermissionSnapshot::new();
    for view in views {
        let assignment = &view.assignment;
        let resource_name = assignment
            .resource_name
            .clone()
            .or_else(|| view.resource.as_ref().map(|r| r.name.clone()));
        let Some(resource_name) = resource_name else {
            tracing::debug!(
                assignment_id = %assignment.id,
                "skipping assignment without a resource name"
            );
            continue;
        };
        let scope_type = view.resource_scope().to_string();
        let scope_ref = view.effective_scope_ref().map(str::to_string);
        let action = assignment
            .action_name
            .clone()
            .or_else(|| view.action.as_ref().map(|a| a.name.clone()))
            .unwrap_or_else(|| crate::expr::WILDCARD.to_string());

        let scopes = snapshot.entry(resource_name).or_default();
        let position = scopes
            .iter()
            .position(|s| s.scope_type == scope_type && s.scope_ref == scope_ref);
        let entry = match position {
            Some(index) => &mut scopes[index],
            None => {
                scopes.push(ScopePermissions {
                    scope_type,
                    scope_ref,
                    actions: Vec::new(),
                });
                let last = scopes.len() - 1;
                &mut scopes[last]
            }
        };
        if !entry.actions.contains(&action) {
            entry.actions.push(action);
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use entity::{entitlement_assignments, entitlements, resources};

    fn view(
        resource: Option<(&str, Option<&str>)>,
        assignment_resource: Option<&str>,
        action: &str,
        assignment_scope: Option<&str>,
        entitlement_scope: Option<&str>,
    ) -> AssignmentView {
        let now = Utc::now().into();
        let org_id = Uuid::new_v4();
        let resource = resource.map(|(name, scope_type)| resources::Model {
            id: Uuid::new_v4(),
            org_id,
            name: name.to_string(),
            scope_type: scope_type.map(str::to_string),
            description: None,
            etag: "e".into(),
            created_at: now,
            updated_at: now,
        });
        let entitlement = entitlements::Model {
            id: Uuid::new_v4(),
            org_id,
            action_id: None,
            resource_id: resource.as_ref().map(|r| r.id),
            action_expr: format!("x:{action}"),
            scope_ref: entitlement_scope.map(str::to_string),
            created_at: now,
        };
        AssignmentView {
            assignment: entitlement_assignments::Model {
                id: Uuid::new_v4(),
                entitlement_id: entitlement.id,
                subject_type: SubjectType::User,
                subject_ref: "u".into(),
                org_id,
                action_name: Some(action.to_string()),
                resource_name: assignment_resource.map(str::to_string),
                resolved_expr: entitlement.action_expr.clone(),
                scope_ref: assignment_scope.map(str::to_string),
                source_role_id: None,
                created_at: now,
            },
            entitlement: Some(entitlement),
            resource,
            action: None,
        }
    }

    #[test]
    fn groups_by_resource_and_scope_and_dedupes_actions() {
        let views = vec![
            view(Some(("invoice", Some("org"))), Some("invoice"), "read", None, Some("o1")),
            view(Some(("invoice", Some("org"))), Some("invoice"), "approve", None, Some("o1")),
            view(Some(("invoice", Some("org"))), Some("invoice"), "read", None, Some("o1")),
            view(Some(("invoice", Some("org"))), Some("invoice"), "read", Some("o2"), Some("o1")),
        ];
        let snapshot = fold_snapshot(&views);
        let scopes = &snapshot["invoice"];
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].scope_type, "org");
        assert_eq!(scopes[0].scope_ref.as_deref(), Some("o1"));
        assert_eq!(scopes[0].actions, vec!["read", "approve"]);
        assert_eq!(scopes[1].scope_ref.as_deref(), Some("o2"));
    }

    #[test]
    fn falls_back_to_entitlement_resource_and_domain_scope() {
        let views = vec![view(Some(("ledger", None)), None, "post", None, None)];
        let snapshot = fold_snapshot(&views);
        assert_eq!(snapshot["ledger"][0].scope_type, "domain");
        assert_eq!(snapshot["ledger"][0].actions, vec!["post"]);
    }

    #[test]
    fn skips_assignments_without_any_resource_name() {
        let views = vec![
            view(None, None, "post", None, None),
            view(Some(("ledger", None)), None, "read", None, None),
        ];
        let snapshot = fold_snapshot(&views);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("ledger"));
    }
}
