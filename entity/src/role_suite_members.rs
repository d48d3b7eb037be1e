use crate::kinds::MemberType;
use sea_orm::prelude::{DateTimeWithTimeZone, *};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "role_suite_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub suite_id: Uuid,
    pub member_type: MemberType,
    pub member_ref: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::role_suites::Entity",
        from = "Column::SuiteId",
        to = "super::role_suites::Column::Id",
        on_delete = "Cascade"
    )]
    Suite,
}

impl Related<super::role_suites::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Suite.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
