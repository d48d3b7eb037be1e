use async_trait::async_trait;
use entity::{group_members, groups, hierarchies, users};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::error::StoreError;
use crate::ports::IdentityLookup;

/// Identity lookups backed by the shared identity tables.
#[derive(Clone, Debug)]
pub struct SeaOrmIdentity {
    db: DatabaseConnection,
}

impl SeaOrmIdentity {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityLookup for SeaOrmIdentity {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let count = users::Entity::find_by_id(user_id).count(&self.db).await?;
        Ok(count > 0)
    }

    async fn group_exists(&self, group_id: Uuid) -> Result<bool, StoreError> {
        let count = groups::Entity::find_by_id(group_id).count(&self.db).await?;
        Ok(count > 0)
    }

    async fn direct_manager(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let Some(user) = users::Entity::find_by_id(user_id).one(&self.db).await? else {
            return Ok(None);
        };
        let Some(position) = user.hierarchy_id else {
            return Ok(None);
        };
        let Some(node) = hierarchies::Entity::find_by_id(position).one(&self.db).await? else {
            return Ok(None);
        };
        let Some(parent_id) = node.parent_id else {
            return Ok(None);
        };
        let manager = users::Entity::find()
            .filter(users::Column::HierarchyId.eq(parent_id))
            .filter(users::Column::IsActive.eq(true))
            .filter(users::Column::Id.ne(user_id))
            .order_by_asc(users::Column::CreatedAt)
            .order_by_asc(users::Column::Id)
            .one(&self.db)
            .await?;
        Ok(manager.map(|m| m.id))
    }

    async fn group_members(&self, group_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let rows = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id))
            .order_by_asc(group_members::Column::UserId)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|row| row.user_id).collect())
    }
}
