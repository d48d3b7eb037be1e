//! Idempotent demo catalog: one org, an invoice resource and a role that grants it.

use anyhow::{Context, Result};
use chrono::Utc;
use entity::kinds::{MemberType, SubjectType};
use entity::orgs;
use platform_authz::AccessEngine;
use platform_authz::model::{AssignEntitlement, CreateEntitlement};
use platform_authz::repo::catalog::{self, NewResource};
use platform_authz::repo::roles::{self as role_repo, NewTarget};
use platform_db::DbPool;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::info;
use uuid::Uuid;

const RESOURCE: &str = "invoice";
const ACTIONS: [&str; 3] = ["read", "approve", "void"];
const ROLE: &str = "invoice-admin";

pub async fn ensure_default_org(pool: &DbPool, slug: &str, name: &str) -> Result<Uuid> {
    if let Some(existing) = orgs::Entity::find()
        .filter(orgs::Column::Slug.eq(slug))
        .one(pool)
        .await?
    {
        return Ok(existing.id);
    }
    let org = orgs::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(slug.to_string()),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(pool)
    .await?;
    info!(org_id = %org.id, slug, "default org created");
    Ok(org.id)
}

pub async fn run(pool: &DbPool, engine: &AccessEngine, org_id: Uuid) -> Result<()> {
    let resource = match catalog::find_resource_by_name(pool, RESOURCE).await? {
        Some(resource) => resource,
        None => {
            catalog::insert_resource(
                pool,
                NewResource {
                    org_id,
                    name: RESOURCE.into(),
                    scope_type: Some("org".into()),
                    description: Some("Accounts payable invoices".into()),
                },
            )
            .await?
        }
    };
    for action in ACTIONS {
        if catalog::find_action_by_name(pool, resource.id, action)
            .await?
            .is_none()
        {
            catalog::insert_action(pool, resource.id, action).await?;
        }
    }

    let entitlement = match catalog::find_entitlement_by_expr(pool, "invoice:*").await? {
        Some(entitlement) => entitlement,
        None => engine
            .entitlements
            .create_entitlement(CreateEntitlement {
                org_id,
                resource_name: Some(RESOURCE.into()),
                action_name: None,
                scope_ref: None,
            })
            .await
            .context("seed entitlement")?,
    };

    if role_repo::find_role_by_name(pool, ROLE).await?.is_none() {
        let role = role_repo::insert_role(
            pool,
            NewTarget {
                org_id,
                name: ROLE.into(),
                owner_type: MemberType::User,
                owner_ref: None,
                is_requestable: true,
                is_required_attachment: false,
                is_required_comment: true,
            },
        )
        .await?;
        engine
            .entitlements
            .assign_entitlement(AssignEntitlement {
                entitlement_id: entitlement.id,
                subject_type: SubjectType::Role,
                subject_ref: role.id.to_string(),
                org_id,
                scope_ref: None,
            })
            .await
            .context("seed role entitlement")?;
    }

    info!(%org_id, "seed data ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use platform_authz::AuthzConfig;
    use sea_orm::Database;

    #[tokio::test]
    async fn seeding_twice_is_harmless() {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&pool, None).await.unwrap();
        let engine = AccessEngine::with_defaults(pool.clone(), &AuthzConfig::default());

        let org_id = ensure_default_org(&pool, "default", "Default").await.unwrap();
        run(&pool, &engine, org_id).await.unwrap();
        assert_eq!(
            ensure_default_org(&pool, "default", "Default").await.unwrap(),
            org_id
        );
        run(&pool, &engine, org_id).await.unwrap();

        let role = role_repo::find_role_by_name(&pool, ROLE).await.unwrap().unwrap();
        assert!(role.is_required_comment);
        assert!(catalog::find_entitlement_by_expr(&pool, "invoice:*")
            .await
            .unwrap()
            .is_some());
    }
}
