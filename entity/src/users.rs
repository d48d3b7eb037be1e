use crate::{hierarchies, orgs};
use sea_orm::prelude::{DateTimeWithTimeZone, *};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub org_id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub display_name: String,
    /// Position in the org chart; the direct manager sits one level up.
    pub hierarchy_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "orgs::Entity",
        from = "Column::OrgId",
        to = "orgs::Column::Id"
    )]
    Org,
    #[sea_orm(
        belongs_to = "hierarchies::Entity",
        from = "Column::HierarchyId",
        to = "hierarchies::Column::Id"
    )]
    Hierarchy,
}

impl Related<orgs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Org.def()
    }
}

impl Related<hierarchies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Hierarchy.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
