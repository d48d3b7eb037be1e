//! Resources, actions and entitlements.

use chrono::Utc;
use entity::{actions, entitlements, resources};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct NewResource {
    pub org_id: Uuid,
    pub name: String,
    pub scope_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewEntitlement {
    pub org_id: Uuid,
    pub action_id: Option<Uuid>,
    pub resource_id: Option<Uuid>,
    pub action_expr: String,
    pub scope_ref: Option<String>,
}

pub async fn find_resource<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<resources::Model>, DbErr> {
    resources::Entity::find_by_id(id).one(conn).await
}

pub async fn find_resource_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<resources::Model>, DbErr> {
    resources::Entity::find()
        .filter(resources::Column::Name.eq(name))
        .one(conn)
        .await
}

pub async fn find_action<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<actions::Model>, DbErr> {
    actions::Entity::find_by_id(id).one(conn).await
}

pub async fn find_action_by_name<C: ConnectionTrait>(
    conn: &C,
    resource_id: Uuid,
    name: &str,
) -> Result<Option<actions::Model>, DbErr> {
    actions::Entity::find()
        .filter(actions::Column::ResourceId.eq(resource_id))
        .filter(actions::Column::Name.eq(name))
        .one(conn)
        .await
}

pub async fn find_entitlement<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<entitlements::Model>, DbErr> {
    entitlements::Entity::find_by_id(id).one(conn).await
}

pub async fn find_entitlements<C: ConnectionTrait>(
    conn: &C,
    ids: &[Uuid],
) -> Result<Vec<entitlements::Model>, DbErr> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    entitlements::Entity::find()
        .filter(entitlements::Column::Id.is_in(ids.iter().copied()))
        .order_by_asc(entitlements::Column::ActionExpr)
        .all(conn)
        .await
}

pub async fn find_entitlement_by_expr<C: ConnectionTrait>(
    conn: &C,
    action_expr: &str,
) -> Result<Option<entitlements::Model>, DbErr> {
    entitlements::Entity::find()
        .filter(entitlements::Column::ActionExpr.eq(action_expr))
        .one(conn)
        .await
}

pub async fn insert_resource<C: ConnectionTrait>(
    conn: &C,
    new: NewResource,
) -> Result<resources::Model, DbErr> {
    let now = Utc::now().into();
    resources::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(new.org_id),
        name: Set(new.name),
        scope_type: Set(new.scope_type),
        description: Set(new.description),
        etag: Set(platform_db::new_etag()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
}

pub async fn insert_action<C: ConnectionTrait>(
    conn: &C,
    resource_id: Uuid,
    name: &str,
) -> Result<actions::Model, DbErr> {
    actions::ActiveModel {
        id: Set(Uuid::new_v4()),
        resource_id: Set(resource_id),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await
}

pub async fn insert_entitlement<C: ConnectionTrait>(
    conn: &C,
    new: NewEntitlement,
) -> Result<entitlements::Model, DbErr> {
    entitlements::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(new.org_id),
        action_id: Set(new.action_id),
        resource_id: Set(new.resource_id),
        action_expr: Set(new.action_expr),
        scope_ref: Set(new.scope_ref),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await
}

/// Compare-and-set update. `None` when the etag no longer matches.
pub async fn update_resource<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    expected_etag: &str,
    scope_type: Option<String>,
    description: Option<String>,
) -> Result<Option<resources::Model>, DbErr> {
    let result = resources::Entity::update_many()
        .col_expr(resources::Column::ScopeType, Expr::value(scope_type))
        .col_expr(resources::Column::Description, Expr::value(description))
        .col_expr(resources::Column::Etag, Expr::value(platform_db::new_etag()))
        .col_expr(
            resources::Column::UpdatedAt,
            Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
        )
        .filter(resources::Column::Id.eq(id))
        .filter(resources::Column::Etag.eq(expected_etag))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Ok(None);
    }
    find_resource(conn, id).await
}

pub async fn delete_entitlement<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<u64, DbErr> {
    let result = entitlements::Entity::delete_by_id(id).exec(conn).await?;
    Ok(result.rows_affected)
}
