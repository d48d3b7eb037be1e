//! Append-only permission history.

use chrono::Utc;
use entity::kinds::{HistoryEvent, TargetType};
use entity::permission_histories as histories;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::model::{Subject, Target};

/// Who did what to whom.
#[derive(Clone, Copy, Debug)]
pub struct HistoryContext<'a> {
    pub event: HistoryEvent,
    pub request_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub subject: &'a Subject,
    pub target: &'a Target,
}

/// One affected assignment. Expressions are copied so the entry stays
/// readable after the rows behind the ids are gone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Effect {
    pub entitlement_id: Option<Uuid>,
    pub assignment_id: Option<Uuid>,
    pub action_expr: Option<String>,
    pub resolved_expr: Option<String>,
}

/// Record the effect of a grant or revoke. With no effects one entry is
/// still written so the membership change itself is on record.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    context: HistoryContext<'_>,
    mut effects: Vec<Effect>,
) -> Result<usize, DbErr> {
    if effects.is_empty() {
        effects.push(Effect::default());
    }
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    let entries: Vec<histories::ActiveModel> = effects
        .into_iter()
        .map(|effect| histories::ActiveModel {
            id: Set(Uuid::new_v4()),
            event: Set(context.event),
            request_id: Set(context.request_id),
            actor_id: Set(context.actor_id),
            subject_type: Set(context.subject.subject_type),
            subject_ref: Set(context.subject.subject_ref.clone()),
            target_type: Set(context.target.target_type),
            target_ref: Set(context.target.id),
            target_name: Set(context.target.name.clone()),
            entitlement_id: Set(effect.entitlement_id),
            assignment_id: Set(effect.assignment_id),
            action_expr: Set(effect.action_expr),
            resolved_expr: Set(effect.resolved_expr),
            created_at: Set(now),
        })
        .collect();
    let count = entries.len();
    histories::Entity::insert_many(entries)
        .exec_without_returning(conn)
        .await?;
    Ok(count)
}

/// Null out links to assignments that are about to be deleted.
pub async fn retire_assignments<C: ConnectionTrait>(
    conn: &C,
    assignment_ids: &[Uuid],
) -> Result<u64, DbErr> {
    if assignment_ids.is_empty() {
        return Ok(0);
    }
    let result = histories::Entity::update_many()
        .col_expr(histories::Column::AssignmentId, Expr::value(Option::<Uuid>::None))
        .filter(histories::Column::AssignmentId.is_in(assignment_ids.iter().copied()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Null out links to an entitlement that is about to be deleted.
pub async fn retire_entitlement<C: ConnectionTrait>(
    conn: &C,
    entitlement_id: Uuid,
) -> Result<u64, DbErr> {
    let result = histories::Entity::update_many()
        .col_expr(histories::Column::EntitlementId, Expr::value(Option::<Uuid>::None))
        .filter(histories::Column::EntitlementId.eq(entitlement_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

pub async fn find_by_target<C: ConnectionTrait>(
    conn: &C,
    target_type: TargetType,
    target_ref: Uuid,
) -> Result<Vec<histories::Model>, DbErr> {
    histories::Entity::find()
        .filter(histories::Column::TargetType.eq(target_type))
        .filter(histories::Column::TargetRef.eq(target_ref))
        .order_by_asc(histories::Column::CreatedAt)
        .all(conn)
        .await
}
