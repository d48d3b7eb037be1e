use crate::kinds::MemberType;
use sea_orm::prelude::{DateTimeWithTimeZone, *};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "role_suites")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub org_id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub owner_type: MemberType,
    pub owner_ref: Option<Uuid>,
    pub is_requestable: bool,
    pub is_required_attachment: bool,
    pub is_required_comment: bool,
    pub etag: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::role_suite_roles::Entity")]
    SuiteRole,
    #[sea_orm(has_many = "super::role_suite_members::Entity")]
    Member,
}

impl Related<super::role_suite_roles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SuiteRole.def()
    }
}

impl Related<super::role_suite_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
