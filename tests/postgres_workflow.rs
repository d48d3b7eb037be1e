use anyhow::Result;
use entity::kinds::{Decision, MemberType, RequestStatus, SubjectType, TargetType};
use migration::{Migrator, MigratorTrait};
use platform_authz::model::{
    AccessDecision, AssignEntitlement, CreateEntitlement, CreateGrantRequest, IsAuthorizedQuery,
    RespondToGrantRequest,
};
use platform_authz::repo::catalog::{self, NewResource};
use platform_authz::repo::roles::{self as role_repo, NewTarget};
use suite_tests::PgTestContext;
use uuid::Uuid;

fn grant(requestor: Uuid, receiver: Uuid, role_id: Uuid) -> CreateGrantRequest {
    CreateGrantRequest {
        requestor_id: requestor,
        receiver_type: MemberType::User,
        receiver_ref: receiver,
        target_type: TargetType::Role,
        target_ref: role_id,
        attachment: None,
        comment: None,
    }
}

async fn owned_role(ctx: &PgTestContext, owner: Uuid) -> Result<Uuid> {
    let role = role_repo::insert_role(
        &ctx.db,
        NewTarget {
            org_id: ctx.org_id,
            name: "ap-clerk".into(),
            owner_type: MemberType::User,
            owner_ref: Some(owner),
            is_requestable: true,
            is_required_attachment: false,
            is_required_comment: false,
        },
    )
    .await?;
    Ok(role.id)
}

#[tokio::test]
async fn concurrent_duplicate_requests_leave_one_pending() -> Result<()> {
    let Some(ctx) = PgTestContext::new().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };
    let owner = ctx.user("owner@acme.test", None).await?;
    let clerk = ctx.user("clerk@acme.test", None).await?;
    let role_id = owned_role(&ctx, owner).await?;

    let first = ctx.engine.grants.clone();
    let second = ctx.engine.grants.clone();
    let (a, b) = tokio::join!(
        first.create_grant_request(grant(clerk, clerk, role_id)),
        second.create_grant_request(grant(clerk, clerk, role_id)),
    );
    let outcomes = [a, b];
    let created = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(created, 1);
    let rejected = outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .filter_map(|err| err.client())
        .filter(|client| client.code == "ALREADY_EXISTS")
        .count();
    assert_eq!(rejected, 1);

    ctx.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn approval_grants_access_on_postgres() -> Result<()> {
    let Some(ctx) = PgTestContext::new().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };
    let top = ctx.hierarchy("finance", None).await?;
    let team = ctx.hierarchy("payables", Some(top)).await?;
    let manager = ctx.user("manager@acme.test", Some(top)).await?;
    let clerk = ctx.user("clerk@acme.test", Some(team)).await?;
    let owner = ctx.user("owner@acme.test", None).await?;
    let role_id = owned_role(&ctx, owner).await?;

    let resource = catalog::insert_resource(
        &ctx.db,
        NewResource {
            org_id: ctx.org_id,
            name: "invoice".into(),
            scope_type: None,
            description: None,
        },
    )
    .await?;
    catalog::insert_action(&ctx.db, resource.id, "approve").await?;
    let entitlement = ctx
        .engine
        .entitlements
        .create_entitlement(CreateEntitlement {
            org_id: ctx.org_id,
            resource_name: Some("invoice".into()),
            action_name: Some("approve".into()),
            scope_ref: None,
        })
        .await?;
    ctx.engine
        .entitlements
        .assign_entitlement(AssignEntitlement {
            entitlement_id: entitlement.id,
            subject_type: SubjectType::Role,
            subject_ref: role_id.to_string(),
            org_id: ctx.org_id,
            scope_ref: None,
        })
        .await?;

    let grants = &ctx.engine.grants;
    let request = grants.create_grant_request(grant(clerk, clerk, role_id)).await?;
    assert_eq!(request.approval_id, Some(manager));
    let escalated = grants
        .respond_to_grant_request(RespondToGrantRequest {
            request_id: request.id,
            decision: Decision::Approve,
            responder_id: manager,
            comment: None,
            etag: request.etag,
        })
        .await?;
    let approved = grants
        .respond_to_grant_request(RespondToGrantRequest {
            request_id: request.id,
            decision: Decision::Approve,
            responder_id: owner,
            comment: Some("ok".into()),
            etag: escalated.etag,
        })
        .await?;
    assert_eq!(approved.status, RequestStatus::Approved);

    let decision = ctx
        .engine
        .authorize
        .is_authorized(IsAuthorizedQuery {
            action_name: "approve".into(),
            resource_name: "invoice".into(),
            scope_ref: None,
            subject_type: SubjectType::User,
            subject_ref: clerk.to_string(),
        })
        .await?;
    assert_eq!(decision, AccessDecision::Allow);

    // Holding the role blocks another request for it.
    let revisit = grants.create_grant_request(grant(clerk, clerk, role_id)).await;
    assert_eq!(revisit.unwrap_err().client().map(|c| c.code), Some("ALREADY_EXISTS"));

    ctx.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn migrations_roll_back_cleanly() -> Result<()> {
    let Some(ctx) = PgTestContext::new().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };
    Migrator::down(&ctx.db, None).await?;
    assert!(!Migrator::get_pending_migrations(&ctx.db).await?.is_empty());
    Migrator::up(&ctx.db, None).await?;
    assert!(Migrator::get_pending_migrations(&ctx.db).await?.is_empty());
    ctx.cleanup().await;
    Ok(())
}
