use crate::kinds::{MemberType, RequestStatus, TargetType};
use sea_orm::prelude::{DateTimeWithTimeZone, *};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "revoke_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub requestor_id: Uuid,
    pub receiver_type: MemberType,
    pub receiver_ref: Uuid,
    pub target_type: TargetType,
    pub target_ref: Uuid,
    pub status: RequestStatus,
    pub attachment: Option<String>,
    pub comment: Option<String>,
    pub etag: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
