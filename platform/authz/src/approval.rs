//! Ownership, approver resolution and membership side effects shared by the
//! grant and revoke workflows.

use std::collections::HashSet;

use entity::entitlement_assignments as assignments;
use entity::kinds::{MemberType, SubjectType, TargetType};
use platform_api::{ClientError, FieldErrorKind};
use sea_orm::{ConnectionTrait, DbErr};
use uuid::Uuid;

use crate::error::{Fault, StoreError};
use crate::expr::diff_entitlement_ids;
use crate::model::{Subject, Target};
use crate::ports::IdentityLookup;
use crate::repo::history::Effect;
use crate::repo::roles::Member;
use crate::repo::{assignments as assignment_repo, catalog, history, roles};

fn target_label(target_type: TargetType) -> &'static str {
    match target_type {
        TargetType::Role => "role",
        TargetType::RoleSuite => "role suite",
    }
}

/// The role or suite a request points at, or `NOT_FOUND` on `targetRef`.
pub(crate) async fn load_target<C: ConnectionTrait>(
    conn: &C,
    target_type: TargetType,
    target_ref: Uuid,
) -> Result<Target, Fault> {
    roles::find_target(conn, target_type, target_ref)
        .await?
        .ok_or_else(|| {
            Fault::from(ClientError::field(
                "targetRef",
                FieldErrorKind::NotFound,
                format!("{} {target_ref} does not exist", target_label(target_type)),
            ))
        })
}

pub async fn holds_target<C: ConnectionTrait>(
    conn: &C,
    target: &Target,
    member: Member,
) -> Result<bool, DbErr> {
    roles::exist_member(conn, target.target_type, target.id, member).await
}

/// People allowed to act on a request, resolved fresh on every call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Approvers {
    pub manager: Option<Uuid>,
    /// The owner as stored on the target: a user or a group id.
    pub owner_ref: Option<Uuid>,
    /// Users who may act as owner; a group owner expands to its members.
    pub owners: Vec<Uuid>,
}

pub async fn resolve_approvers(
    identity: &dyn IdentityLookup,
    receiver: Member,
    target: &Target,
) -> Result<Approvers, StoreError> {
    let manager = match receiver {
        (MemberType::User, user_id) => identity.direct_manager(user_id).await?,
        (MemberType::Group, _) => None,
    };
    let owners = match (target.owner_type, target.owner_ref) {
        (_, None) => Vec::new(),
        (MemberType::User, Some(user_id)) => vec![user_id],
        (MemberType::Group, Some(group_id)) => identity.group_members(group_id).await?,
    };
    Ok(Approvers {
        manager,
        owner_ref: target.owner_ref,
        owners,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApproverRole {
    ManagerOnly,
    ManagerAndOwner,
    OwnerOnly,
    None,
}

impl ApproverRole {
    /// Owner approval, alone or together with the manager, completes a request.
    pub fn is_final(self) -> bool {
        matches!(self, ApproverRole::OwnerOnly | ApproverRole::ManagerAndOwner)
    }
}

pub fn classify_approver(responder: Uuid, manager: Option<Uuid>, owners: &[Uuid]) -> ApproverRole {
    let is_manager = manager == Some(responder);
    let is_owner = owners.contains(&responder);
    match (is_manager, is_owner) {
        (true, true) => ApproverRole::ManagerAndOwner,
        (true, false) => ApproverRole::ManagerOnly,
        (false, true) => ApproverRole::OwnerOnly,
        (false, false) => ApproverRole::None,
    }
}

/// Add (`add = true`) or remove the member's hold on the target.
pub async fn apply_membership<C: ConnectionTrait>(
    conn: &C,
    target: &Target,
    member: Member,
    add: bool,
) -> Result<bool, DbErr> {
    roles::add_remove_member(conn, target.target_type, target.id, member, add).await
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncReport {
    pub added: Vec<assignments::Model>,
    pub removed: Vec<assignments::Model>,
}

/// Bring the member's derived assignments in line with the roles and suites
/// it currently holds.
///
/// Entitlements the member already holds directly are left alone; removed
/// rows have their history links retired before they are deleted.
pub async fn sync_derived_assignments<C: ConnectionTrait>(
    conn: &C,
    member: Member,
) -> Result<SyncReport, DbErr> {
    let subject = Subject::member(member.0, member.1);
    let (role_ids, suite_ids) = roles::held_by(conn, member).await?;

    let mut containers: Vec<(Uuid, Subject)> = Vec::new();
    for role_id in role_ids
        .iter()
        .copied()
        .chain(roles::roles_in_suites(conn, &suite_ids).await?)
    {
        containers.push((role_id, Subject::new(SubjectType::Role, role_id.to_string())));
    }
    for suite_id in &suite_ids {
        containers.push((*suite_id, Subject::new(SubjectType::Suite, suite_id.to_string())));
    }

    let mut seen_containers = HashSet::new();
    let mut seen_entitlements = HashSet::new();
    let mut desired: Vec<(Uuid, assignments::Model)> = Vec::new();
    for (source, container) in containers {
        if !seen_containers.insert(container.clone()) {
            continue;
        }
        for template in assignment_repo::find_all_by_subject(conn, &container).await? {
            if template.source_role_id.is_none() && seen_entitlements.insert(template.entitlement_id)
            {
                desired.push((source, template));
            }
        }
    }

    let (derived, direct): (Vec<_>, Vec<_>) = assignment_repo::find_all_by_subject(conn, &subject)
        .await?
        .into_iter()
        .partition(|row| row.source_role_id.is_some());
    let direct_ids: HashSet<Uuid> = direct.iter().map(|row| row.entitlement_id).collect();
    let desired_ids: Vec<Uuid> = desired
        .iter()
        .map(|(_, template)| template.entitlement_id)
        .filter(|id| !direct_ids.contains(id))
        .collect();
    let current_ids: Vec<Uuid> = derived.iter().map(|row| row.entitlement_id).collect();
    let (added_ids, removed_ids) = diff_entitlement_ids(&current_ids, &desired_ids);

    let removed: Vec<assignments::Model> = derived
        .into_iter()
        .filter(|row| removed_ids.contains(&row.entitlement_id))
        .collect();
    remove_assignments(conn, &removed).await?;

    let mut added = Vec::with_capacity(added_ids.len());
    for (source, template) in desired
        .iter()
        .filter(|(_, template)| added_ids.contains(&template.entitlement_id))
    {
        let new = assignment_repo::derive_from(template, subject.clone(), Some(*source));
        added.push(assignment_repo::insert(conn, new).await?);
    }

    if !added.is_empty() || !removed.is_empty() {
        tracing::debug!(
            subject_type = ?subject.subject_type,
            subject_ref = %subject.subject_ref,
            added = added.len(),
            removed = removed.len(),
            "derived assignments synced"
        );
    }
    Ok(SyncReport { added, removed })
}

/// Re-derive assignments for every listed member.
pub async fn resync_members<C: ConnectionTrait>(
    conn: &C,
    members: &[Member],
) -> Result<(), DbErr> {
    for member in members {
        sync_derived_assignments(conn, *member).await?;
    }
    Ok(())
}

/// Retire history links, then hard-delete.
pub async fn remove_assignments<C: ConnectionTrait>(
    conn: &C,
    rows: &[assignments::Model],
) -> Result<u64, DbErr> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    history::retire_assignments(conn, &ids).await?;
    assignment_repo::delete_hard(conn, &ids).await
}

/// History effects for the given rows, copying each entitlement's expression.
pub async fn history_effects<C: ConnectionTrait>(
    conn: &C,
    rows: &[assignments::Model],
    keep_assignment_link: bool,
) -> Result<Vec<Effect>, DbErr> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.entitlement_id).collect();
    let entitlements = catalog::find_entitlements(conn, &ids).await?;
    Ok(rows
        .iter()
        .map(|row| Effect {
            entitlement_id: Some(row.entitlement_id),
            assignment_id: keep_assignment_link.then_some(row.id),
            action_expr: entitlements
                .iter()
                .find(|e| e.id == row.entitlement_id)
                .map(|e| e.action_expr.clone()),
            resolved_expr: Some(row.resolved_expr.clone()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_every_combination() {
        let m = Uuid::new_v4();
        let o = Uuid::new_v4();
        let r = Uuid::new_v4();
        assert_eq!(classify_approver(m, Some(m), &[o]), ApproverRole::ManagerOnly);
        assert_eq!(classify_approver(o, Some(m), &[o]), ApproverRole::OwnerOnly);
        assert_eq!(classify_approver(m, Some(m), &[m]), ApproverRole::ManagerAndOwner);
        assert_eq!(classify_approver(r, Some(m), &[o]), ApproverRole::None);
        assert_eq!(classify_approver(r, None, &[]), ApproverRole::None);
    }

    #[test]
    fn group_owner_members_count_as_owner() {
        let m = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(classify_approver(b, Some(m), &[a, b]), ApproverRole::OwnerOnly);
    }

    #[test]
    fn only_owner_roles_are_final() {
        assert!(ApproverRole::OwnerOnly.is_final());
        assert!(ApproverRole::ManagerAndOwner.is_final());
        assert!(!ApproverRole::ManagerOnly.is_final());
        assert!(!ApproverRole::None.is_final());
    }
}
