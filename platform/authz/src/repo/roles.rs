//! Roles, role suites and their memberships.

use std::collections::HashSet;

use chrono::Utc;
use entity::kinds::{MemberType, TargetType};
use entity::{role_members, role_suite_members, role_suite_roles, role_suites, roles};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::model::Target;

/// A user or group holding a role or suite.
pub type Member = (MemberType, Uuid);

#[derive(Clone, Debug)]
pub struct NewTarget {
    pub org_id: Uuid,
    pub name: String,
    pub owner_type: MemberType,
    pub owner_ref: Option<Uuid>,
    pub is_requestable: bool,
    pub is_required_attachment: bool,
    pub is_required_comment: bool,
}

pub async fn find_role<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<roles::Model>, DbErr> {
    roles::Entity::find_by_id(id).one(conn).await
}

pub async fn find_role_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<roles::Model>, DbErr> {
    roles::Entity::find()
        .filter(roles::Column::Name.eq(name))
        .one(conn)
        .await
}

pub async fn find_suite<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<role_suites::Model>, DbErr> {
    role_suites::Entity::find_by_id(id).one(conn).await
}

pub async fn find_target<C: ConnectionTrait>(
    conn: &C,
    target_type: TargetType,
    id: Uuid,
) -> Result<Option<Target>, DbErr> {
    Ok(match target_type {
        TargetType::Role => find_role(conn, id).await?.map(Target::from),
        TargetType::RoleSuite => find_suite(conn, id).await?.map(Target::from),
    })
}

pub async fn insert_role<C: ConnectionTrait>(
    conn: &C,
    new: NewTarget,
) -> Result<roles::Model, DbErr> {
    let now = Utc::now().into();
    roles::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(new.org_id),
        name: Set(new.name),
        owner_type: Set(new.owner_type),
        owner_ref: Set(new.owner_ref),
        is_requestable: Set(new.is_requestable),
        is_required_attachment: Set(new.is_required_attachment),
        is_required_comment: Set(new.is_required_comment),
        etag: Set(platform_db::new_etag()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
}

pub async fn insert_suite<C: ConnectionTrait>(
    conn: &C,
    new: NewTarget,
) -> Result<role_suites::Model, DbErr> {
    let now = Utc::now().into();
    role_suites::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(new.org_id),
        name: Set(new.name),
        owner_type: Set(new.owner_type),
        owner_ref: Set(new.owner_ref),
        is_requestable: Set(new.is_requestable),
        is_required_attachment: Set(new.is_required_attachment),
        is_required_comment: Set(new.is_required_comment),
        etag: Set(platform_db::new_etag()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
}

pub async fn add_role_to_suite<C: ConnectionTrait>(
    conn: &C,
    suite_id: Uuid,
    role_id: Uuid,
) -> Result<(), DbErr> {
    role_suite_roles::Entity::insert(role_suite_roles::ActiveModel {
        suite_id: Set(suite_id),
        role_id: Set(role_id),
    })
    .exec_without_returning(conn)
    .await?;
    Ok(())
}

pub async fn roles_in_suite<C: ConnectionTrait>(
    conn: &C,
    suite_id: Uuid,
) -> Result<Vec<Uuid>, DbErr> {
    roles_in_suites(conn, &[suite_id]).await
}

pub async fn roles_in_suites<C: ConnectionTrait>(
    conn: &C,
    suite_ids: &[Uuid],
) -> Result<Vec<Uuid>, DbErr> {
    if suite_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = role_suite_roles::Entity::find()
        .filter(role_suite_roles::Column::SuiteId.is_in(suite_ids.iter().copied()))
        .order_by_asc(role_suite_roles::Column::SuiteId)
        .order_by_asc(role_suite_roles::Column::RoleId)
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|row| row.role_id).collect())
}

pub async fn suites_containing<C: ConnectionTrait>(
    conn: &C,
    role_id: Uuid,
) -> Result<Vec<Uuid>, DbErr> {
    let rows = role_suite_roles::Entity::find()
        .filter(role_suite_roles::Column::RoleId.eq(role_id))
        .order_by_asc(role_suite_roles::Column::SuiteId)
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|row| row.suite_id).collect())
}

/// Whether the member directly holds the role or suite.
pub async fn exist_member<C: ConnectionTrait>(
    conn: &C,
    target_type: TargetType,
    target_id: Uuid,
    member: Member,
) -> Result<bool, DbErr> {
    let (member_type, member_ref) = member;
    let count = match target_type {
        TargetType::Role => {
            role_members::Entity::find()
                .filter(role_members::Column::RoleId.eq(target_id))
                .filter(role_members::Column::MemberType.eq(member_type))
                .filter(role_members::Column::MemberRef.eq(member_ref))
                .count(conn)
                .await?
        }
        TargetType::RoleSuite => {
            role_suite_members::Entity::find()
                .filter(role_suite_members::Column::SuiteId.eq(target_id))
                .filter(role_suite_members::Column::MemberType.eq(member_type))
                .filter(role_suite_members::Column::MemberRef.eq(member_ref))
                .count(conn)
                .await?
        }
    };
    Ok(count > 0)
}

/// Add or remove one membership row. Returns whether anything changed.
pub async fn add_remove_member<C: ConnectionTrait>(
    conn: &C,
    target_type: TargetType,
    target_id: Uuid,
    member: Member,
    add: bool,
) -> Result<bool, DbErr> {
    let (member_type, member_ref) = member;
    let held = exist_member(conn, target_type, target_id, member).await?;
    if held == add {
        return Ok(false);
    }
    let now = Utc::now().into();
    match (target_type, add) {
        (TargetType::Role, true) => {
            role_members::ActiveModel {
                id: Set(Uuid::new_v4()),
                role_id: Set(target_id),
                member_type: Set(member_type),
                member_ref: Set(member_ref),
                created_at: Set(now),
            }
            .insert(conn)
            .await?;
        }
        (TargetType::Role, false) => {
            role_members::Entity::delete_many()
                .filter(role_members::Column::RoleId.eq(target_id))
                .filter(role_members::Column::MemberType.eq(member_type))
                .filter(role_members::Column::MemberRef.eq(member_ref))
                .exec(conn)
                .await?;
        }
        (TargetType::RoleSuite, true) => {
            role_suite_members::ActiveModel {
                id: Set(Uuid::new_v4()),
                suite_id: Set(target_id),
                member_type: Set(member_type),
                member_ref: Set(member_ref),
                created_at: Set(now),
            }
            .insert(conn)
            .await?;
        }
        (TargetType::RoleSuite, false) => {
            role_suite_members::Entity::delete_many()
                .filter(role_suite_members::Column::SuiteId.eq(target_id))
                .filter(role_suite_members::Column::MemberType.eq(member_type))
                .filter(role_suite_members::Column::MemberRef.eq(member_ref))
                .exec(conn)
                .await?;
        }
    }
    Ok(true)
}

/// Roles held directly plus the suites held by the member.
pub async fn held_by<C: ConnectionTrait>(
    conn: &C,
    member: Member,
) -> Result<(Vec<Uuid>, Vec<Uuid>), DbErr> {
    let (member_type, member_ref) = member;
    let role_ids = role_members::Entity::find()
        .filter(role_members::Column::MemberType.eq(member_type))
        .filter(role_members::Column::MemberRef.eq(member_ref))
        .order_by_asc(role_members::Column::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(|row| row.role_id)
        .collect();
    let suite_ids = role_suite_members::Entity::find()
        .filter(role_suite_members::Column::MemberType.eq(member_type))
        .filter(role_suite_members::Column::MemberRef.eq(member_ref))
        .order_by_asc(role_suite_members::Column::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(|row| row.suite_id)
        .collect();
    Ok((role_ids, suite_ids))
}

/// Every user or group whose derived assignments depend on the target:
/// direct members, plus members of suites that contain a role.
pub async fn dependent_members<C: ConnectionTrait>(
    conn: &C,
    target_type: TargetType,
    target_id: Uuid,
) -> Result<Vec<Member>, DbErr> {
    let mut suite_ids = Vec::new();
    let mut members: Vec<Member> = Vec::new();
    match target_type {
        TargetType::Role => {
            let rows = role_members::Entity::find()
                .filter(role_members::Column::RoleId.eq(target_id))
                .order_by_asc(role_members::Column::CreatedAt)
                .all(conn)
                .await?;
            members.extend(rows.into_iter().map(|r| (r.member_type, r.member_ref)));
            suite_ids.extend(suites_containing(conn, target_id).await?);
        }
        TargetType::RoleSuite => suite_ids.push(target_id),
    }
    if !suite_ids.is_empty() {
        let rows = role_suite_members::Entity::find()
            .filter(role_suite_members::Column::SuiteId.is_in(suite_ids))
            .order_by_asc(role_suite_members::Column::CreatedAt)
            .all(conn)
            .await?;
        members.extend(rows.into_iter().map(|r| (r.member_type, r.member_ref)));
    }
    let mut seen = HashSet::new();
    members.retain(|member| seen.insert(*member));
    Ok(members)
}

/// Bump the etag if it still equals `expected_etag`. Returns the new etag.
pub async fn touch<C: ConnectionTrait>(
    conn: &C,
    target_type: TargetType,
    id: Uuid,
    expected_etag: &str,
) -> Result<Option<String>, DbErr> {
    let etag = platform_db::new_etag();
    let now = sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now());
    let rows = match target_type {
        TargetType::Role => {
            roles::Entity::update_many()
                .col_expr(roles::Column::Etag, Expr::value(etag.clone()))
                .col_expr(roles::Column::UpdatedAt, Expr::value(now))
                .filter(roles::Column::Id.eq(id))
                .filter(roles::Column::Etag.eq(expected_etag))
                .exec(conn)
                .await?
                .rows_affected
        }
        TargetType::RoleSuite => {
            role_suites::Entity::update_many()
                .col_expr(role_suites::Column::Etag, Expr::value(etag.clone()))
                .col_expr(role_suites::Column::UpdatedAt, Expr::value(now))
                .filter(role_suites::Column::Id.eq(id))
                .filter(role_suites::Column::Etag.eq(expected_etag))
                .exec(conn)
                .await?
                .rows_affected
        }
    };
    Ok((rows > 0).then_some(etag))
}

/// Remove the target with its memberships and suite links.
pub async fn delete_hard<C: ConnectionTrait>(
    conn: &C,
    target_type: TargetType,
    id: Uuid,
) -> Result<u64, DbErr> {
    match target_type {
        TargetType::Role => {
            role_members::Entity::delete_many()
                .filter(role_members::Column::RoleId.eq(id))
                .exec(conn)
                .await?;
            role_suite_roles::Entity::delete_many()
                .filter(role_suite_roles::Column::RoleId.eq(id))
                .exec(conn)
                .await?;
            Ok(roles::Entity::delete_by_id(id).exec(conn).await?.rows_affected)
        }
        TargetType::RoleSuite => {
            role_suite_members::Entity::delete_many()
                .filter(role_suite_members::Column::SuiteId.eq(id))
                .exec(conn)
                .await?;
            role_suite_roles::Entity::delete_many()
                .filter(role_suite_roles::Column::SuiteId.eq(id))
                .exec(conn)
                .await?;
            Ok(role_suites::Entity::delete_by_id(id)
                .exec(conn)
                .await?
                .rows_affected)
        }
    }
}
