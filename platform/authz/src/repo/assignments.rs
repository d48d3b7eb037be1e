//! Entitlement assignments and their joined views.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use entity::{actions, entitlement_assignments as assignments, entitlements, resources};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::model::{AssignmentView, Subject};

#[derive(Clone, Debug)]
pub struct NewAssignment {
    pub entitlement_id: Uuid,
    pub subject: Subject,
    pub org_id: Uuid,
    pub action_name: Option<String>,
    pub resource_name: Option<String>,
    pub resolved_expr: String,
    pub scope_ref: Option<String>,
    pub source_role_id: Option<Uuid>,
}

fn subject_filter(subject: &Subject) -> Condition {
    Condition::all()
        .add(assignments::Column::SubjectType.eq(subject.subject_type))
        .add(assignments::Column::SubjectRef.eq(subject.subject_ref.as_str()))
}

/// Every assignment bound to exactly this subject, direct and derived.
pub async fn find_all_by_subject<C: ConnectionTrait>(
    conn: &C,
    subject: &Subject,
) -> Result<Vec<assignments::Model>, DbErr> {
    assignments::Entity::find()
        .filter(subject_filter(subject))
        .order_by_asc(assignments::Column::CreatedAt)
        .order_by_asc(assignments::Column::Id)
        .all(conn)
        .await
}

pub async fn find_all_by_entitlement_id<C: ConnectionTrait>(
    conn: &C,
    entitlement_id: Uuid,
) -> Result<Vec<assignments::Model>, DbErr> {
    assignments::Entity::find()
        .filter(assignments::Column::EntitlementId.eq(entitlement_id))
        .order_by_asc(assignments::Column::CreatedAt)
        .all(conn)
        .await
}

pub async fn find_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<assignments::Model>, DbErr> {
    assignments::Entity::find_by_id(id).one(conn).await
}

pub async fn find_existing<C: ConnectionTrait>(
    conn: &C,
    entitlement_id: Uuid,
    subject: &Subject,
    org_id: Uuid,
) -> Result<Option<assignments::Model>, DbErr> {
    assignments::Entity::find()
        .filter(subject_filter(subject))
        .filter(assignments::Column::EntitlementId.eq(entitlement_id))
        .filter(assignments::Column::OrgId.eq(org_id))
        .one(conn)
        .await
}

/// Views for every assignment bound to the subject.
pub async fn find_views_by_subject<C: ConnectionTrait>(
    conn: &C,
    subject: &Subject,
) -> Result<Vec<AssignmentView>, DbErr> {
    let rows = find_all_by_subject(conn, subject).await?;
    join_views(conn, rows).await
}

/// Attach entitlement, resource and action to each row with three batched reads.
async fn join_views<C: ConnectionTrait>(
    conn: &C,
    rows: Vec<assignments::Model>,
) -> Result<Vec<AssignmentView>, DbErr> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let entitlement_ids: BTreeSet<Uuid> = rows.iter().map(|r| r.entitlement_id).collect();
    let entitlements: HashMap<Uuid, entitlements::Model> = entitlements::Entity::find()
        .filter(entitlements::Column::Id.is_in(entitlement_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();

    let resource_ids: BTreeSet<Uuid> = entitlements.values().filter_map(|e| e.resource_id).collect();
    let resources: HashMap<Uuid, resources::Model> = if resource_ids.is_empty() {
        HashMap::new()
    } else {
        resources::Entity::find()
            .filter(resources::Column::Id.is_in(resource_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect()
    };

    let action_ids: BTreeSet<Uuid> = entitlements.values().filter_map(|e| e.action_id).collect();
    let actions: HashMap<Uuid, actions::Model> = if action_ids.is_empty() {
        HashMap::new()
    } else {
        actions::Entity::find()
            .filter(actions::Column::Id.is_in(action_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|assignment| {
            let entitlement = entitlements.get(&assignment.entitlement_id).cloned();
            let resource = entitlement
                .as_ref()
                .and_then(|e| e.resource_id)
                .and_then(|id| resources.get(&id).cloned());
            let action = entitlement
                .as_ref()
                .and_then(|e| e.action_id)
                .and_then(|id| actions.get(&id).cloned());
            AssignmentView {
                assignment,
                entitlement,
                resource,
                action,
            }
        })
        .collect())
}

pub async fn insert<C: ConnectionTrait>(
    conn: &C,
    new: NewAssignment,
) -> Result<assignments::Model, DbErr> {
    assignments::ActiveModel {
        id: Set(Uuid::new_v4()),
        entitlement_id: Set(new.entitlement_id),
        subject_type: Set(new.subject.subject_type),
        subject_ref: Set(new.subject.subject_ref),
        org_id: Set(new.org_id),
        action_name: Set(new.action_name),
        resource_name: Set(new.resource_name),
        resolved_expr: Set(new.resolved_expr),
        scope_ref: Set(new.scope_ref),
        source_role_id: Set(new.source_role_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await
}

/// Copy of `template` bound to another subject.
pub fn derive_from(
    template: &assignments::Model,
    subject: Subject,
    source_role_id: Option<Uuid>,
) -> NewAssignment {
    NewAssignment {
        entitlement_id: template.entitlement_id,
        subject,
        org_id: template.org_id,
        action_name: template.action_name.clone(),
        resource_name: template.resource_name.clone(),
        resolved_expr: template.resolved_expr.clone(),
        scope_ref: template.scope_ref.clone(),
        source_role_id,
    }
}

/// Physical delete. History links must be retired first.
pub async fn delete_hard<C: ConnectionTrait>(conn: &C, ids: &[Uuid]) -> Result<u64, DbErr> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = assignments::Entity::delete_many()
        .filter(assignments::Column::Id.is_in(ids.iter().copied()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
