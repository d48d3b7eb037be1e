use crate::kinds::SubjectType;
use sea_orm::prelude::{DateTimeWithTimeZone, *};
use uuid::Uuid;

/// Denormalized binding of an entitlement to a subject.
///
/// Rows with a `source_role_id` are derived from a role or suite membership
/// and are maintained by the grant/revoke workflow; rows without one were
/// assigned directly.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "entitlement_assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub entitlement_id: Uuid,
    pub subject_type: SubjectType,
    pub subject_ref: String,
    pub org_id: Uuid,
    pub action_name: Option<String>,
    pub resource_name: Option<String>,
    pub resolved_expr: String,
    pub scope_ref: Option<String>,
    pub source_role_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::entitlements::Entity",
        from = "Column::EntitlementId",
        to = "super::entitlements::Column::Id"
    )]
    Entitlement,
}

impl Related<super::entitlements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entitlement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
