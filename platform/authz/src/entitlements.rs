//! Catalog maintenance that keeps assignments consistent with their sources.

use std::collections::HashSet;
use std::sync::Arc;

use entity::kinds::{SubjectType, TargetType};
use entity::{entitlement_assignments, entitlements, resources, roles};
use platform_api::{ClientError, FieldErrorKind, ValidationErrors};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::instrument;
use uuid::Uuid;

use crate::approval;
use crate::error::{Fault, ServiceResult, unique_as};
use crate::expr::{compute_action_expr, diff_entitlement_ids, resolve_expr};
use crate::model::{
    AssignEntitlement, CreateEntitlement, ScopeType, SetRoleEntitlements, Subject, UpdateResource,
};
use crate::ports::IdentityLookup;
use crate::repo::assignments::{self, NewAssignment};
use crate::repo::catalog::{self, NewEntitlement};
use crate::repo::{history, roles as role_repo};
use crate::validation::Validator;

#[derive(Clone)]
pub struct EntitlementService {
    db: DatabaseConnection,
    identity: Arc<dyn IdentityLookup>,
    validator: Validator,
}

impl EntitlementService {
    pub fn new(
        db: DatabaseConnection,
        identity: Arc<dyn IdentityLookup>,
        validator: Validator,
    ) -> Self {
        Self {
            db,
            identity,
            validator,
        }
    }

    #[instrument(name = "authz.create_entitlement", skip_all)]
    pub async fn create_entitlement(
        &self,
        cmd: CreateEntitlement,
    ) -> ServiceResult<entitlements::Model> {
        self.create(cmd)
            .await
            .map_err(|fault| fault.during("create entitlement"))
    }

    #[instrument(
        name = "authz.assign_entitlement",
        skip_all,
        fields(entitlement_id = %cmd.entitlement_id, subject_type = ?cmd.subject_type)
    )]
    pub async fn assign_entitlement(
        &self,
        cmd: AssignEntitlement,
    ) -> ServiceResult<entitlement_assignments::Model> {
        self.assign(cmd)
            .await
            .map_err(|fault| fault.during("assign entitlement"))
    }

    #[instrument(name = "authz.delete_assignment", skip_all, fields(assignment_id = %id))]
    pub async fn delete_assignment(&self, id: Uuid) -> ServiceResult<()> {
        self.unassign(id)
            .await
            .map_err(|fault| fault.during("delete assignment"))
    }

    #[instrument(name = "authz.delete_entitlement", skip_all, fields(entitlement_id = %id))]
    pub async fn delete_entitlement(&self, id: Uuid) -> ServiceResult<()> {
        self.remove_entitlement(id)
            .await
            .map_err(|fault| fault.during("delete entitlement"))
    }

    #[instrument(name = "authz.set_role_entitlements", skip_all, fields(role_id = %cmd.role_id))]
    pub async fn set_role_entitlements(
        &self,
        cmd: SetRoleEntitlements,
    ) -> ServiceResult<roles::Model> {
        self.set_role(cmd)
            .await
            .map_err(|fault| fault.during("set role entitlements"))
    }

    #[instrument(name = "authz.delete_target", skip_all, fields(target_type = ?target_type, target_id = %id))]
    pub async fn delete_target(
        &self,
        target_type: TargetType,
        id: Uuid,
        etag: &str,
    ) -> ServiceResult<()> {
        self.remove_target(target_type, id, etag)
            .await
            .map_err(|fault| fault.during("delete role"))
    }

    #[instrument(name = "authz.update_resource", skip_all, fields(resource_id = %cmd.resource_id))]
    pub async fn update_resource(&self, cmd: UpdateResource) -> ServiceResult<resources::Model> {
        self.patch_resource(cmd)
            .await
            .map_err(|fault| fault.during("update resource"))
    }

    async fn create(&self, cmd: CreateEntitlement) -> Result<entitlements::Model, Fault> {
        let mut errors = ValidationErrors::new();
        self.validator.id(&mut errors, "orgId", cmd.org_id);
        self.validator
            .optional_name(&mut errors, "resourceName", cmd.resource_name.as_deref());
        self.validator
            .optional_name(&mut errors, "actionName", cmd.action_name.as_deref());
        self.validator
            .optional_name(&mut errors, "scopeRef", cmd.scope_ref.as_deref());
        if cmd.action_name.is_some() && cmd.resource_name.is_none() {
            errors.required("resourceName");
        }
        errors.into_result()?;

        let resource = match cmd.resource_name.as_deref() {
            Some(name) => Some(
                catalog::find_resource_by_name(&self.db, name)
                    .await?
                    .ok_or_else(|| {
                        ClientError::field(
                            "resourceName",
                            FieldErrorKind::NotFound,
                            format!("resource {name} does not exist"),
                        )
                    })?,
            ),
            None => None,
        };
        let action = match (resource.as_ref(), cmd.action_name.as_deref()) {
            (Some(resource), Some(name)) => Some(
                catalog::find_action_by_name(&self.db, resource.id, name)
                    .await?
                    .ok_or_else(|| {
                        ClientError::field(
                            "actionName",
                            FieldErrorKind::NotFound,
                            format!("action {name} does not exist on resource {}", resource.name),
                        )
                    })?,
            ),
            _ => None,
        };

        let action_expr = compute_action_expr(
            resource.as_ref().map(|r| r.name.as_str()),
            action.as_ref().map(|a| a.name.as_str()),
        );
        let duplicate = || {
            ClientError::field(
                "actionExpr",
                FieldErrorKind::AlreadyExists,
                format!("entitlement {action_expr} already exists"),
            )
        };
        if catalog::find_entitlement_by_expr(&self.db, &action_expr)
            .await?
            .is_some()
        {
            return Err(duplicate().into());
        }
        let created = catalog::insert_entitlement(
            &self.db,
            NewEntitlement {
                org_id: cmd.org_id,
                action_id: action.as_ref().map(|a| a.id),
                resource_id: resource.as_ref().map(|r| r.id),
                action_expr: action_expr.clone(),
                scope_ref: cmd.scope_ref,
            },
        )
        .await
        .map_err(|err| unique_as(err, duplicate))?;
        tracing::info!(entitlement_id = %created.id, action_expr = %created.action_expr, "entitlement created");
        Ok(created)
    }

    async fn assign(
        &self,
        cmd: AssignEntitlement,
    ) -> Result<entitlement_assignments::Model, Fault> {
        let mut errors = ValidationErrors::new();
        self.validator
            .id(&mut errors, "entitlementId", cmd.entitlement_id);
        self.validator.id(&mut errors, "orgId", cmd.org_id);
        self.validator
            .name(&mut errors, "subjectRef", &cmd.subject_ref);
        self.validator
            .optional_name(&mut errors, "scopeRef", cmd.scope_ref.as_deref());
        errors.into_result()?;

        let entitlement = catalog::find_entitlement(&self.db, cmd.entitlement_id)
            .await?
            .ok_or_else(|| entitlement_not_found(cmd.entitlement_id))?;
        let subject = Subject::new(cmd.subject_type, cmd.subject_ref.clone());
        self.ensure_subject(&subject).await?;

        let duplicate = || {
            ClientError::field(
                "entitlementId",
                FieldErrorKind::AlreadyExists,
                format!(
                    "entitlement {} is already assigned to this subject",
                    entitlement.action_expr
                ),
            )
        };
        if assignments::find_existing(&self.db, entitlement.id, &subject, cmd.org_id)
            .await?
            .is_some()
        {
            return Err(duplicate().into());
        }

        let new = self
            .template_for(&entitlement, subject.clone(), cmd.org_id, cmd.scope_ref)
            .await?;
        let dependents = match container_target(&subject) {
            Some((target_type, id)) => {
                role_repo::dependent_members(&self.db, target_type, id).await?
            }
            None => Vec::new(),
        };

        let txn = self.db.begin().await?;
        let created = assignments::insert(&txn, new)
            .await
            .map_err(|err| unique_as(err, duplicate))?;
        approval::resync_members(&txn, &dependents).await?;
        txn.commit().await?;
        tracing::info!(
            assignment_id = %created.id,
            members = dependents.len(),
            "entitlement assigned"
        );
        Ok(created)
    }

    /// User and group subjects must exist; roles and suites must exist; custom refs are free.
    async fn ensure_subject(&self, subject: &Subject) -> Result<(), Fault> {
        let not_found = || {
            Fault::from(ClientError::field(
                "subjectRef",
                FieldErrorKind::NotFound,
                format!("subject {} does not exist", subject.subject_ref),
            ))
        };
        if subject.subject_type == SubjectType::Custom {
            return Ok(());
        }
        let id = Uuid::parse_str(&subject.subject_ref).map_err(|_| not_found())?;
        let exists = match subject.subject_type {
            SubjectType::User => self.identity.user_exists(id).await?,
            SubjectType::Group => self.identity.group_exists(id).await?,
            SubjectType::Role => role_repo::find_role(&self.db, id).await?.is_some(),
            SubjectType::Suite => role_repo::find_suite(&self.db, id).await?.is_some(),
            SubjectType::Custom => true,
        };
        if exists { Ok(()) } else { Err(not_found()) }
    }

    async fn template_for(
        &self,
        entitlement: &entitlements::Model,
        subject: Subject,
        org_id: Uuid,
        scope_ref: Option<String>,
    ) -> Result<NewAssignment, Fault> {
        let resource = match entitlement.resource_id {
            Some(id) => catalog::find_resource(&self.db, id).await?,
            None => None,
        };
        let action = match entitlement.action_id {
            Some(id) => catalog::find_action(&self.db, id).await?,
            None => None,
        };
        let effective_scope = scope_ref.as_deref().or(entitlement.scope_ref.as_deref());
        Ok(NewAssignment {
            entitlement_id: entitlement.id,
            subject,
            org_id,
            action_name: action.map(|a| a.name),
            resource_name: resource.map(|r| r.name),
            resolved_expr: resolve_expr(&entitlement.action_expr, effective_scope),
            scope_ref,
            source_role_id: None,
        })
    }

    async fn unassign(&self, id: Uuid) -> Result<(), Fault> {
        let assignment = assignments::find_by_id(&self.db, id).await?.ok_or_else(|| {
            ClientError::field(
                "assignmentId",
                FieldErrorKind::NotFound,
                format!("assignment {id} does not exist"),
            )
        })?;
        if assignment.source_role_id.is_some() {
            return Err(ClientError::field(
                "assignmentId",
                FieldErrorKind::ConstraintViolated,
                "derived assignments follow their role; revoke the role instead",
            )
            .into());
        }
        let subject = Subject::new(assignment.subject_type, assignment.subject_ref.clone());
        let dependents = match container_target(&subject) {
            Some((target_type, target_id)) => {
                role_repo::dependent_members(&self.db, target_type, target_id).await?
            }
            None => Vec::new(),
        };

        let txn = self.db.begin().await?;
        approval::remove_assignments(&txn, std::slice::from_ref(&assignment)).await?;
        approval::resync_members(&txn, &dependents).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn remove_entitlement(&self, id: Uuid) -> Result<(), Fault> {
        catalog::find_entitlement(&self.db, id)
            .await?
            .ok_or_else(|| entitlement_not_found(id))?;

        let txn = self.db.begin().await?;
        let rows = assignments::find_all_by_entitlement_id(&txn, id).await?;
        let removed = approval::remove_assignments(&txn, &rows).await?;
        history::retire_entitlement(&txn, id).await?;
        catalog::delete_entitlement(&txn, id).await?;
        txn.commit().await?;
        tracing::info!(entitlement_id = %id, assignments = removed, "entitlement deleted");
        Ok(())
    }

    async fn set_role(&self, cmd: SetRoleEntitlements) -> Result<roles::Model, Fault> {
        let mut errors = ValidationErrors::new();
        self.validator.id(&mut errors, "roleId", cmd.role_id);
        self.validator.etag(&mut errors, "etag", &cmd.etag);
        errors.into_result()?;

        let role = role_repo::find_role(&self.db, cmd.role_id)
            .await?
            .ok_or_else(|| {
                ClientError::field(
                    "roleId",
                    FieldErrorKind::NotFound,
                    format!("role {} does not exist", cmd.role_id),
                )
            })?;
        if !platform_db::etag_matches(&role.etag, &cmd.etag) {
            return Err(etag_conflict());
        }

        let mut seen = HashSet::new();
        let wanted: Vec<Uuid> = cmd
            .entitlement_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        let found = catalog::find_entitlements(&self.db, &wanted).await?;
        let mut errors = ValidationErrors::new();
        for id in &wanted {
            if !found.iter().any(|e| e.id == *id) {
                errors.not_found("entitlementIds", format!("entitlement {id} does not exist"));
            }
        }
        errors.into_result()?;

        let subject = Subject::new(SubjectType::Role, role.id.to_string());
        let current: Vec<entitlement_assignments::Model> =
            assignments::find_all_by_subject(&self.db, &subject)
                .await?
                .into_iter()
                .filter(|a| a.source_role_id.is_none())
                .collect();
        let current_ids: Vec<Uuid> = current.iter().map(|a| a.entitlement_id).collect();
        let (added, removed) = diff_entitlement_ids(&current_ids, &wanted);

        let mut templates = Vec::with_capacity(added.len());
        for id in &added {
            if let Some(entitlement) = found.iter().find(|e| e.id == *id) {
                templates.push(
                    self.template_for(entitlement, subject.clone(), role.org_id, None)
                        .await?,
                );
            }
        }
        let dependents =
            role_repo::dependent_members(&self.db, TargetType::Role, role.id).await?;
        let stale: Vec<entitlement_assignments::Model> = current
            .into_iter()
            .filter(|a| removed.contains(&a.entitlement_id))
            .collect();

        let txn = self.db.begin().await?;
        role_repo::touch(&txn, TargetType::Role, role.id, &role.etag)
            .await?
            .ok_or_else(etag_conflict)?;
        approval::remove_assignments(&txn, &stale).await?;
        for template in templates {
            assignments::insert(&txn, template).await?;
        }
        approval::resync_members(&txn, &dependents).await?;
        let updated = role_repo::find_role(&txn, role.id)
            .await?
            .ok_or_else(etag_conflict)?;
        txn.commit().await?;

        tracing::info!(
            role_id = %role.id,
            added = added.len(),
            removed = removed.len(),
            members = dependents.len(),
            "role entitlements updated"
        );
        Ok(updated)
    }

    async fn remove_target(&self, target_type: TargetType, id: Uuid, etag: &str) -> Result<(), Fault> {
        let mut errors = ValidationErrors::new();
        self.validator.id(&mut errors, "targetRef", id);
        self.validator.etag(&mut errors, "etag", etag);
        errors.into_result()?;

        let target = approval::load_target(&self.db, target_type, id).await?;
        if !platform_db::etag_matches(&target.etag, etag) {
            return Err(etag_conflict());
        }
        let dependents = role_repo::dependent_members(&self.db, target_type, id).await?;
        let templates = assignments::find_all_by_subject(&self.db, &target.subject()).await?;

        let txn = self.db.begin().await?;
        role_repo::touch(&txn, target_type, id, &target.etag)
            .await?
            .ok_or_else(etag_conflict)?;
        approval::remove_assignments(&txn, &templates).await?;
        role_repo::delete_hard(&txn, target_type, id).await?;
        approval::resync_members(&txn, &dependents).await?;
        txn.commit().await?;

        tracing::info!(
            target_id = %id,
            members = dependents.len(),
            "role deleted"
        );
        Ok(())
    }

    async fn patch_resource(&self, cmd: UpdateResource) -> Result<resources::Model, Fault> {
        let mut errors = ValidationErrors::new();
        self.validator.id(&mut errors, "resourceId", cmd.resource_id);
        self.validator.etag(&mut errors, "etag", &cmd.etag);
        self.validator
            .optional_name(&mut errors, "scopeType", cmd.scope_type.as_deref());
        errors.into_result()?;

        let resource = catalog::find_resource(&self.db, cmd.resource_id)
            .await?
            .ok_or_else(|| {
                ClientError::field(
                    "resourceId",
                    FieldErrorKind::NotFound,
                    format!("resource {} does not exist", cmd.resource_id),
                )
            })?;
        if !platform_db::etag_matches(&resource.etag, &cmd.etag) {
            return Err(etag_conflict());
        }

        let scope_type = match (resource.scope_type.clone(), cmd.scope_type) {
            (Some(stored), Some(requested)) => {
                if ScopeType::parse(Some(&stored)) != ScopeType::parse(Some(&requested)) {
                    return Err(ClientError::field(
                        "scopeType",
                        FieldErrorKind::ConstraintViolated,
                        "scope type cannot change once set",
                    )
                    .into());
                }
                Some(stored)
            }
            (None, Some(requested)) => {
                let parsed = ScopeType::parse(Some(&requested));
                if !parsed.is_known() {
                    return Err(ClientError::field(
                        "scopeType",
                        FieldErrorKind::Invalid,
                        format!("unknown scope type {requested}"),
                    )
                    .into());
                }
                Some(parsed.to_string())
            }
            (stored, None) => stored,
        };
        let description = cmd.description.or(resource.description);
        catalog::update_resource(&self.db, resource.id, &resource.etag, scope_type, description)
            .await?
            .ok_or_else(etag_conflict)
    }
}

/// Role or suite behind a subject, when the subject is one.
fn container_target(subject: &Subject) -> Option<(TargetType, Uuid)> {
    let target_type = match subject.subject_type {
        SubjectType::Role => TargetType::Role,
        SubjectType::Suite => TargetType::RoleSuite,
        _ => return None,
    };
    Uuid::parse_str(&subject.subject_ref)
        .ok()
        .map(|id| (target_type, id))
}

fn entitlement_not_found(id: Uuid) -> ClientError {
    ClientError::field(
        "entitlementId",
        FieldErrorKind::NotFound,
        format!("entitlement {id} does not exist"),
    )
}

fn etag_conflict() -> Fault {
    let mut errors = ValidationErrors::new();
    errors.etag_mismatch("etag");
    errors.into()
}
