#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use entity::kinds::{MemberType, SubjectType};
use entity::{entitlements, group_members, groups, hierarchies, orgs, role_suites, roles, users};
use migration::{Migrator, MigratorTrait};
use platform_authz::model::{AssignEntitlement, CreateEntitlement};
use platform_authz::repo::catalog::{self, NewResource};
use platform_authz::repo::roles::{self as role_repo, NewTarget};
use platform_authz::{AccessEngine, AuthzConfig, Notification, Notifier, SeaOrmIdentity};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

pub struct TestContext {
    pub db: DatabaseConnection,
    pub engine: AccessEngine,
    pub notifier: Arc<RecordingNotifier>,
    pub org_id: Uuid,
}

pub async fn setup() -> TestContext {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let identity = Arc::new(SeaOrmIdentity::new(db.clone()));
    let engine = AccessEngine::new(
        db.clone(),
        identity,
        notifier.clone(),
        &AuthzConfig::default(),
    );
    let org_id = Uuid::new_v4();
    orgs::ActiveModel {
        id: Set(org_id),
        slug: Set("acme".into()),
        name: Set("Acme".into()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&db)
    .await
    .unwrap();
    TestContext {
        db,
        engine,
        notifier,
        org_id,
    }
}

impl TestContext {
    pub async fn hierarchy(&self, name: &str, parent: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        hierarchies::ActiveModel {
            id: Set(id),
            org_id: Set(self.org_id),
            parent_id: Set(parent),
            name: Set(name.into()),
        }
        .insert(&self.db)
        .await
        .unwrap();
        id
    }

    pub async fn user(&self, email: &str, hierarchy_id: Option<Uuid>) -> Uuid {
        self.user_with_status(email, hierarchy_id, true).await
    }

    pub async fn user_with_status(
        &self,
        email: &str,
        hierarchy_id: Option<Uuid>,
        is_active: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        users::ActiveModel {
            id: Set(id),
            org_id: Set(self.org_id),
            email: Set(email.into()),
            display_name: Set(email.into()),
            hierarchy_id: Set(hierarchy_id),
            is_active: Set(is_active),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .unwrap();
        id
    }

    pub async fn group(&self, name: &str, members: &[Uuid]) -> Uuid {
        let id = Uuid::new_v4();
        groups::ActiveModel {
            id: Set(id),
            org_id: Set(self.org_id),
            name: Set(name.into()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .unwrap();
        for user_id in members {
            group_members::Entity::insert(group_members::ActiveModel {
                group_id: Set(id),
                user_id: Set(*user_id),
            })
            .exec_without_returning(&self.db)
            .await
            .unwrap();
        }
        id
    }

    pub async fn leave_group(&self, group_id: Uuid, user_id: Uuid) {
        group_members::Entity::delete_many()
            .filter(group_members::Column::GroupId.eq(group_id))
            .filter(group_members::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .unwrap();
    }

    /// Resource with the given actions.
    pub async fn resource(&self, name: &str, scope_type: Option<&str>, actions: &[&str]) -> Uuid {
        let resource = catalog::insert_resource(
            &self.db,
            NewResource {
                org_id: self.org_id,
                name: name.into(),
                scope_type: scope_type.map(str::to_string),
                description: None,
            },
        )
        .await
        .unwrap();
        for action in actions {
            catalog::insert_action(&self.db, resource.id, action)
                .await
                .unwrap();
        }
        resource.id
    }

    pub async fn entitlement(
        &self,
        resource: &str,
        action: &str,
        scope_ref: Option<&str>,
    ) -> entitlements::Model {
        self.engine
            .entitlements
            .create_entitlement(CreateEntitlement {
                org_id: self.org_id,
                resource_name: Some(resource.into()),
                action_name: Some(action.into()),
                scope_ref: scope_ref.map(str::to_string),
            })
            .await
            .unwrap()
    }

    pub async fn role(&self, name: &str, owner: Option<(MemberType, Uuid)>) -> roles::Model {
        role_repo::insert_role(&self.db, self.target_spec(name, owner))
            .await
            .unwrap()
    }

    pub async fn suite(
        &self,
        name: &str,
        owner: Option<(MemberType, Uuid)>,
        role_ids: &[Uuid],
    ) -> role_suites::Model {
        let suite = role_repo::insert_suite(&self.db, self.target_spec(name, owner))
            .await
            .unwrap();
        for role_id in role_ids {
            role_repo::add_role_to_suite(&self.db, suite.id, *role_id)
                .await
                .unwrap();
        }
        suite
    }

    fn target_spec(&self, name: &str, owner: Option<(MemberType, Uuid)>) -> NewTarget {
        NewTarget {
            org_id: self.org_id,
            name: name.into(),
            owner_type: owner.map(|(kind, _)| kind).unwrap_or(MemberType::User),
            owner_ref: owner.map(|(_, id)| id),
            is_requestable: true,
            is_required_attachment: false,
            is_required_comment: false,
        }
    }

    pub async fn assign(&self, entitlement_id: Uuid, subject_type: SubjectType, subject_ref: Uuid) {
        self.assign_scoped(entitlement_id, subject_type, subject_ref, None)
            .await;
    }

    pub async fn assign_scoped(
        &self,
        entitlement_id: Uuid,
        subject_type: SubjectType,
        subject_ref: Uuid,
        scope_ref: Option<&str>,
    ) {
        self.engine
            .entitlements
            .assign_entitlement(AssignEntitlement {
                entitlement_id,
                subject_type,
                subject_ref: subject_ref.to_string(),
                org_id: self.org_id,
                scope_ref: scope_ref.map(str::to_string),
            })
            .await
            .unwrap();
    }
}

/// Org chart: `manager` sits one level above `employee`; `owner` is elsewhere.
pub struct Staff {
    pub manager: Uuid,
    pub employee: Uuid,
    pub owner: Uuid,
    pub requestor: Uuid,
}

pub async fn staff(ctx: &TestContext) -> Staff {
    let top = ctx.hierarchy("finance", None).await;
    let team = ctx.hierarchy("payables", Some(top)).await;
    let manager = ctx.user("manager@acme.test", Some(top)).await;
    let employee = ctx.user("employee@acme.test", Some(team)).await;
    let owner = ctx.user("owner@acme.test", None).await;
    let requestor = ctx.user("requestor@acme.test", None).await;
    Staff {
        manager,
        employee,
        owner,
        requestor,
    }
}
