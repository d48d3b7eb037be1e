use crate::kinds::{MemberType, RequestStatus, TargetType};
use sea_orm::prelude::{DateTimeWithTimeZone, *};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "grant_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub requestor_id: Uuid,
    pub receiver_type: MemberType,
    pub receiver_ref: Uuid,
    pub target_type: TargetType,
    pub target_ref: Uuid,
    pub status: RequestStatus,
    /// Current holder of the approval chain: the manager, then the owner.
    pub approval_id: Option<Uuid>,
    pub attachment: Option<String>,
    pub comment: Option<String>,
    pub etag: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::grant_responses::Entity")]
    Response,
}

impl Related<super::grant_responses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Response.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
