use crate::kinds::{HistoryEvent, SubjectType, TargetType};
use sea_orm::prelude::{DateTimeWithTimeZone, *};
use uuid::Uuid;

/// Append-only audit of grant and revoke effects.
///
/// `entitlement_id` and `assignment_id` are nulled when the referenced rows
/// are deleted; the copied expressions keep the record readable.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "permission_histories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub event: HistoryEvent,
    pub request_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub subject_type: SubjectType,
    pub subject_ref: String,
    pub target_type: TargetType,
    pub target_ref: Uuid,
    pub target_name: String,
    #[sea_orm(indexed)]
    pub entitlement_id: Option<Uuid>,
    #[sea_orm(indexed)]
    pub assignment_id: Option<Uuid>,
    pub action_expr: Option<String>,
    pub resolved_expr: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
