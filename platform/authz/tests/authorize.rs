mod common;

use common::setup;
use entity::kinds::{MemberType, SubjectType};
use platform_authz::model::{AccessDecision, IsAuthorizedQuery, ScopePermissions};
use uuid::Uuid;

fn query(subject_type: SubjectType, subject_ref: Uuid, resource: &str, action: &str) -> IsAuthorizedQuery {
    IsAuthorizedQuery {
        action_name: action.into(),
        resource_name: resource.into(),
        scope_ref: None,
        subject_type,
        subject_ref: subject_ref.to_string(),
    }
}

#[tokio::test]
async fn direct_domain_assignment_allows_only_its_action() {
    let ctx = setup().await;
    let user = ctx.user("clerk@acme.test", None).await;
    ctx.resource("invoice", None, &["approve", "read"]).await;
    let approve = ctx.entitlement("invoice", "approve", None).await;
    ctx.assign(approve.id, SubjectType::User, user).await;
    let authorize = &ctx.engine.authorize;

    let allowed = query(SubjectType::User, user, "invoice", "approve");
    assert_eq!(authorize.is_authorized(allowed.clone()).await.unwrap(), AccessDecision::Allow);
    // Same inputs, same answer.
    assert_eq!(authorize.is_authorized(allowed).await.unwrap(), AccessDecision::Allow);
    assert_eq!(
        authorize
            .is_authorized(query(SubjectType::User, user, "invoice", "read"))
            .await
            .unwrap(),
        AccessDecision::Deny
    );
    let stranger = ctx.user("stranger@acme.test", None).await;
    assert_eq!(
        authorize
            .is_authorized(query(SubjectType::User, stranger, "invoice", "approve"))
            .await
            .unwrap(),
        AccessDecision::Deny
    );
}

#[tokio::test]
async fn org_scoped_entitlement_needs_matching_scope_ref() {
    let ctx = setup().await;
    let user = ctx.user("clerk@acme.test", None).await;
    ctx.resource("ledger", Some("org"), &["post"]).await;
    let post = ctx.entitlement("ledger", "post", Some("org-east")).await;
    ctx.assign(post.id, SubjectType::User, user).await;
    let authorize = &ctx.engine.authorize;

    let mut scoped = query(SubjectType::User, user, "ledger", "post");
    scoped.scope_ref = Some("org-east".into());
    assert_eq!(authorize.is_authorized(scoped.clone()).await.unwrap(), AccessDecision::Allow);

    scoped.scope_ref = Some("org-west".into());
    assert_eq!(authorize.is_authorized(scoped.clone()).await.unwrap(), AccessDecision::Deny);

    scoped.scope_ref = None;
    assert_eq!(authorize.is_authorized(scoped).await.unwrap(), AccessDecision::Deny);
}

#[tokio::test]
async fn assignment_scope_ref_limits_an_unscoped_entitlement() {
    let ctx = setup().await;
    let user = ctx.user("clerk@acme.test", None).await;
    ctx.resource("ledger", Some("org"), &["post"]).await;
    let post = ctx.entitlement("ledger", "post", None).await;
    ctx.assign_scoped(post.id, SubjectType::User, user, Some("org-a"))
        .await;
    let authorize = &ctx.engine.authorize;

    let mut scoped = query(SubjectType::User, user, "ledger", "post");
    scoped.scope_ref = Some("org-a".into());
    assert_eq!(authorize.is_authorized(scoped.clone()).await.unwrap(), AccessDecision::Allow);
    scoped.scope_ref = Some("org-b".into());
    assert_eq!(authorize.is_authorized(scoped).await.unwrap(), AccessDecision::Deny);

    let snapshot = authorize.permission_snapshot(user).await.unwrap();
    assert_eq!(
        snapshot["ledger"],
        vec![ScopePermissions {
            scope_type: "org".into(),
            scope_ref: Some("org-a".into()),
            actions: vec!["post".into()],
        }]
    );
}

#[tokio::test]
async fn private_resources_never_match() {
    let ctx = setup().await;
    let user = ctx.user("clerk@acme.test", None).await;
    ctx.resource("payroll", Some("private"), &["read"]).await;
    let read = ctx.entitlement("payroll", "read", None).await;
    ctx.assign(read.id, SubjectType::User, user).await;

    assert_eq!(
        ctx.engine
            .authorize
            .is_authorized(query(SubjectType::User, user, "payroll", "read"))
            .await
            .unwrap(),
        AccessDecision::Deny
    );
}

#[tokio::test]
async fn suite_subject_is_expanded_to_its_roles() {
    let ctx = setup().await;
    ctx.resource("invoice", None, &["approve"]).await;
    let approve = ctx.entitlement("invoice", "approve", None).await;
    let role = ctx.role("ap-clerk", None).await;
    ctx.assign(approve.id, SubjectType::Role, role.id).await;
    let suite = ctx.suite("finance", None, &[role.id]).await;
    let empty = ctx.suite("facilities", None, &[]).await;
    let authorize = &ctx.engine.authorize;

    assert_eq!(
        authorize
            .is_authorized(query(SubjectType::Role, role.id, "invoice", "approve"))
            .await
            .unwrap(),
        AccessDecision::Allow
    );
    assert_eq!(
        authorize
            .is_authorized(query(SubjectType::Suite, suite.id, "invoice", "approve"))
            .await
            .unwrap(),
        AccessDecision::Allow
    );
    assert_eq!(
        authorize
            .is_authorized(query(SubjectType::Suite, empty.id, "invoice", "approve"))
            .await
            .unwrap(),
        AccessDecision::Deny
    );
}

#[tokio::test]
async fn group_assignments_apply_to_the_group_subject() {
    let ctx = setup().await;
    let member = ctx.user("clerk@acme.test", None).await;
    let group = ctx.group("ap-team", &[member]).await;
    ctx.resource("invoice", None, &["read"]).await;
    let read = ctx.entitlement("invoice", "read", None).await;
    ctx.assign(read.id, SubjectType::Group, group).await;

    assert_eq!(
        ctx.engine
            .authorize
            .is_authorized(query(SubjectType::Group, group, "invoice", "read"))
            .await
            .unwrap(),
        AccessDecision::Allow
    );
}

#[tokio::test]
async fn unknown_resource_or_action_is_not_found() {
    let ctx = setup().await;
    let user = ctx.user("clerk@acme.test", None).await;
    ctx.resource("invoice", None, &["approve"]).await;
    let authorize = &ctx.engine.authorize;

    let err = authorize
        .is_authorized(query(SubjectType::User, user, "ghost", "approve"))
        .await
        .unwrap_err();
    let client = err.client().unwrap();
    assert_eq!(client.code, "NOT_FOUND");
    assert_eq!(client.fields[0].field, "resourceName");

    let err = authorize
        .is_authorized(query(SubjectType::User, user, "invoice", "void"))
        .await
        .unwrap_err();
    let client = err.client().unwrap();
    assert_eq!(client.code, "NOT_FOUND");
    assert_eq!(client.fields[0].field, "actionName");

    let err = authorize
        .is_authorized(IsAuthorizedQuery {
            action_name: " ".into(),
            resource_name: "invoice".into(),
            scope_ref: None,
            subject_type: SubjectType::User,
            subject_ref: user.to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.client().unwrap().fields[0].field, "actionName");
}

#[tokio::test]
async fn snapshot_groups_actions_by_resource_and_scope() {
    let ctx = setup().await;
    let user = ctx.user("clerk@acme.test", None).await;
    ctx.resource("invoice", None, &["approve", "read"]).await;
    ctx.resource("ledger", Some("org"), &["post"]).await;
    for (resource, action, scope) in [
        ("invoice", "approve", None),
        ("invoice", "read", None),
        ("ledger", "post", Some("org-east")),
    ] {
        let entitlement = ctx.entitlement(resource, action, scope).await;
        ctx.assign(entitlement.id, SubjectType::User, user).await;
    }

    let snapshot = ctx.engine.authorize.permission_snapshot(user).await.unwrap();
    assert_eq!(snapshot.len(), 2);
    let mut invoice = snapshot["invoice"].clone();
    assert_eq!(invoice.len(), 1);
    invoice[0].actions.sort();
    assert_eq!(
        invoice[0],
        ScopePermissions {
            scope_type: "domain".into(),
            scope_ref: None,
            actions: vec!["approve".into(), "read".into()],
        }
    );
    assert_eq!(
        snapshot["ledger"],
        vec![ScopePermissions {
            scope_type: "org".into(),
            scope_ref: Some("org-east".into()),
            actions: vec!["post".into()],
        }]
    );

    let nobody = ctx.user("nobody@acme.test", None).await;
    assert!(ctx.engine.authorize.permission_snapshot(nobody).await.unwrap().is_empty());
}

#[tokio::test]
async fn snapshot_includes_role_derived_assignments() {
    let ctx = setup().await;
    let user = ctx.user("clerk@acme.test", None).await;
    ctx.resource("invoice", None, &["approve"]).await;
    let approve = ctx.entitlement("invoice", "approve", None).await;
    let role = ctx.role("ap-clerk", None).await;
    ctx.assign(approve.id, SubjectType::Role, role.id).await;

    platform_authz::repo::roles::add_remove_member(
        &ctx.db,
        entity::kinds::TargetType::Role,
        role.id,
        (MemberType::User, user),
        true,
    )
    .await
    .unwrap();
    platform_authz::approval::sync_derived_assignments(&ctx.db, (MemberType::User, user))
        .await
        .unwrap();

    let snapshot = ctx.engine.authorize.permission_snapshot(user).await.unwrap();
    assert_eq!(snapshot["invoice"][0].actions, vec!["approve".to_string()]);
}
