//! Grant requests, their responses, and revoke requests.

use chrono::Utc;
use entity::kinds::{Decision, MemberType, RequestStatus, TargetType};
use entity::{grant_requests, grant_responses, revoke_requests};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

/// Fields shared by new grant and revoke requests.
#[derive(Clone, Debug)]
pub struct NewRequest {
    pub requestor_id: Uuid,
    pub receiver_type: MemberType,
    pub receiver_ref: Uuid,
    pub target_type: TargetType,
    pub target_ref: Uuid,
    pub attachment: Option<String>,
    pub comment: Option<String>,
}

pub async fn create_grant<C: ConnectionTrait>(
    conn: &C,
    new: NewRequest,
    approval_id: Option<Uuid>,
) -> Result<grant_requests::Model, DbErr> {
    let now = Utc::now().into();
    grant_requests::ActiveModel {
        id: Set(Uuid::new_v4()),
        requestor_id: Set(new.requestor_id),
        receiver_type: Set(new.receiver_type),
        receiver_ref: Set(new.receiver_ref),
        target_type: Set(new.target_type),
        target_ref: Set(new.target_ref),
        status: Set(RequestStatus::Pending),
        approval_id: Set(approval_id),
        attachment: Set(new.attachment),
        comment: Set(new.comment),
        etag: Set(platform_db::new_etag()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
}

pub async fn find_grant<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<grant_requests::Model>, DbErr> {
    grant_requests::Entity::find_by_id(id).one(conn).await
}

pub async fn find_pending_by_receiver_and_target<C: ConnectionTrait>(
    conn: &C,
    receiver_type: MemberType,
    receiver_ref: Uuid,
    target_type: TargetType,
    target_ref: Uuid,
) -> Result<Option<grant_requests::Model>, DbErr> {
    grant_requests::Entity::find()
        .filter(grant_requests::Column::ReceiverType.eq(receiver_type))
        .filter(grant_requests::Column::ReceiverRef.eq(receiver_ref))
        .filter(grant_requests::Column::TargetType.eq(target_type))
        .filter(grant_requests::Column::TargetRef.eq(target_ref))
        .filter(grant_requests::Column::Status.eq(RequestStatus::Pending))
        .one(conn)
        .await
}

/// Compare-and-set on (`id`, `etag`). `None` when another writer got there first.
pub async fn update_grant<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    expected_etag: &str,
    status: RequestStatus,
    approval_id: Option<Uuid>,
) -> Result<Option<grant_requests::Model>, DbErr> {
    let result = grant_requests::Entity::update_many()
        .col_expr(grant_requests::Column::Status, Expr::value(status))
        .col_expr(grant_requests::Column::ApprovalId, Expr::value(approval_id))
        .col_expr(
            grant_requests::Column::Etag,
            Expr::value(platform_db::new_etag()),
        )
        .col_expr(
            grant_requests::Column::UpdatedAt,
            Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
        )
        .filter(grant_requests::Column::Id.eq(id))
        .filter(grant_requests::Column::Etag.eq(expected_etag))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Ok(None);
    }
    find_grant(conn, id).await
}

pub async fn find_response<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    responder_id: Uuid,
) -> Result<Option<grant_responses::Model>, DbErr> {
    grant_responses::Entity::find()
        .filter(grant_responses::Column::RequestId.eq(request_id))
        .filter(grant_responses::Column::ResponderId.eq(responder_id))
        .one(conn)
        .await
}

pub async fn responses_for<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> Result<Vec<grant_responses::Model>, DbErr> {
    grant_responses::Entity::find()
        .filter(grant_responses::Column::RequestId.eq(request_id))
        .order_by_asc(grant_responses::Column::CreatedAt)
        .all(conn)
        .await
}

pub async fn create_response<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    responder_id: Uuid,
    decision: Decision,
    comment: Option<String>,
) -> Result<grant_responses::Model, DbErr> {
    grant_responses::ActiveModel {
        id: Set(Uuid::new_v4()),
        request_id: Set(request_id),
        responder_id: Set(responder_id),
        decision: Set(decision),
        comment: Set(comment),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await
}

/// Revokes execute immediately, so they are stored already approved.
pub async fn create_revoke<C: ConnectionTrait>(
    conn: &C,
    new: NewRequest,
) -> Result<revoke_requests::Model, DbErr> {
    let now = Utc::now().into();
    revoke_requests::ActiveModel {
        id: Set(Uuid::new_v4()),
        requestor_id: Set(new.requestor_id),
        receiver_type: Set(new.receiver_type),
        receiver_ref: Set(new.receiver_ref),
        target_type: Set(new.target_type),
        target_ref: Set(new.target_ref),
        status: Set(RequestStatus::Approved),
        attachment: Set(new.attachment),
        comment: Set(new.comment),
        etag: Set(platform_db::new_etag()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
}

pub async fn find_revoke<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<revoke_requests::Model>, DbErr> {
    revoke_requests::Entity::find_by_id(id).one(conn).await
}
