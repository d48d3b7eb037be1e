mod common;

use common::{setup, staff};
use entity::kinds::{Decision, MemberType, RequestStatus, SubjectType, TargetType};
use platform_api::FieldErrorKind;
use platform_authz::model::{
    AccessDecision, CreateGrantRequest, IsAuthorizedQuery, RespondToGrantRequest,
};
use platform_authz::repo::{history, roles as role_repo};
use platform_authz::{NotificationKind, ServiceError};
use uuid::Uuid;

fn grant_for(requestor: Uuid, receiver: Uuid, role_id: Uuid) -> CreateGrantRequest {
    CreateGrantRequest {
        requestor_id: requestor,
        receiver_type: MemberType::User,
        receiver_ref: receiver,
        target_type: TargetType::Role,
        target_ref: role_id,
        attachment: None,
        comment: Some("  need it for month end  ".into()),
    }
}

fn respond(request_id: Uuid, responder: Uuid, decision: Decision, etag: &str) -> RespondToGrantRequest {
    RespondToGrantRequest {
        request_id,
        decision,
        responder_id: responder,
        comment: None,
        etag: etag.into(),
    }
}

fn client_code(err: ServiceError) -> (&'static str, String) {
    let client = err.client().cloned().expect("client error");
    let field = client.fields.first().map(|f| f.field.clone()).unwrap_or_default();
    (client.code, field)
}

fn approve_query(user: Uuid) -> IsAuthorizedQuery {
    IsAuthorizedQuery {
        action_name: "approve".into(),
        resource_name: "invoice".into(),
        scope_ref: None,
        subject_type: SubjectType::User,
        subject_ref: user.to_string(),
    }
}

#[tokio::test]
async fn manager_then_owner_approval_grants_the_role() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    ctx.resource("invoice", Some("domain"), &["approve"]).await;
    let entitlement = ctx.entitlement("invoice", "approve", None).await;
    let role = ctx.role("ap-clerk", Some((MemberType::User, people.owner))).await;
    ctx.assign(entitlement.id, SubjectType::Role, role.id).await;

    let grants = &ctx.engine.grants;
    let authorize = &ctx.engine.authorize;
    assert_eq!(
        authorize.is_authorized(approve_query(people.employee)).await.unwrap(),
        AccessDecision::Deny
    );

    let request = grants
        .create_grant_request(grant_for(people.requestor, people.employee, role.id))
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.approval_id, Some(people.manager));
    assert_eq!(request.comment.as_deref(), Some("need it for month end"));
    let sent = ctx.notifier.last().unwrap();
    assert_eq!(sent.kind, NotificationKind::ApprovalRequested);
    assert_eq!(sent.recipients, vec![people.manager]);

    let after_manager = grants
        .respond_to_grant_request(respond(request.id, people.manager, Decision::Approve, &request.etag))
        .await
        .unwrap();
    assert_eq!(after_manager.status, RequestStatus::Pending);
    assert_eq!(after_manager.approval_id, Some(people.owner));
    assert_ne!(after_manager.etag, request.etag);
    let sent = ctx.notifier.last().unwrap();
    assert_eq!(sent.kind, NotificationKind::FinalApprovalPending);
    assert_eq!(sent.recipients, vec![people.owner]);

    let approved = grants
        .respond_to_grant_request(respond(
            request.id,
            people.owner,
            Decision::Approve,
            &after_manager.etag,
        ))
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(
        role_repo::exist_member(&ctx.db, TargetType::Role, role.id, (MemberType::User, people.employee))
            .await
            .unwrap()
    );
    let records = history::find_by_target(&ctx.db, TargetType::Role, role.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entitlement_id, Some(entitlement.id));
    assert_eq!(records[0].action_expr.as_deref(), Some("invoice:approve"));
    assert_eq!(
        authorize.is_authorized(approve_query(people.employee)).await.unwrap(),
        AccessDecision::Allow
    );

    let detail = grants.get_grant_request(request.id).await.unwrap();
    assert_eq!(detail.responses.len(), 2);
}

#[tokio::test]
async fn denial_is_terminal() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    let role = ctx.role("ap-clerk", Some((MemberType::User, people.owner))).await;
    let grants = &ctx.engine.grants;

    let request = grants
        .create_grant_request(grant_for(people.requestor, people.employee, role.id))
        .await
        .unwrap();
    let rejected = grants
        .respond_to_grant_request(respond(request.id, people.manager, Decision::Deny, &request.etag))
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(ctx.notifier.last().unwrap().kind, NotificationKind::GrantRejected);

    let err = grants
        .respond_to_grant_request(respond(request.id, people.owner, Decision::Approve, &rejected.etag))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("INVALID_STATE", "requestId".into()));
    assert!(
        !role_repo::exist_member(&ctx.db, TargetType::Role, role.id, (MemberType::User, people.employee))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn owner_who_is_also_manager_approves_in_one_step() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    let role = ctx.role("ap-lead", Some((MemberType::User, people.manager))).await;
    let grants = &ctx.engine.grants;

    let request = grants
        .create_grant_request(grant_for(people.requestor, people.employee, role.id))
        .await
        .unwrap();
    let approved = grants
        .respond_to_grant_request(respond(request.id, people.manager, Decision::Approve, &request.etag))
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    // Role has no entitlements yet; the grant is still on record.
    let records = history::find_by_target(&ctx.db, TargetType::Role, role.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entitlement_id, None);
}

#[tokio::test]
async fn creation_rejects_duplicates_and_held_targets() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    let role = ctx.role("ap-clerk", Some((MemberType::User, people.owner))).await;
    let grants = &ctx.engine.grants;

    grants
        .create_grant_request(grant_for(people.requestor, people.employee, role.id))
        .await
        .unwrap();
    let err = grants
        .create_grant_request(grant_for(people.requestor, people.employee, role.id))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("ALREADY_EXISTS", "targetRef".into()));

    role_repo::add_remove_member(
        &ctx.db,
        TargetType::Role,
        role.id,
        (MemberType::User, people.owner),
        true,
    )
    .await
    .unwrap();
    let err = grants
        .create_grant_request(grant_for(people.requestor, people.owner, role.id))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("ALREADY_EXISTS", "targetRef".into()));
}

#[tokio::test]
async fn creation_enforces_target_policy() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    let grants = &ctx.engine.grants;

    let err = grants
        .create_grant_request(grant_for(people.requestor, people.employee, Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("NOT_FOUND", "targetRef".into()));

    let mut draft = role_repo::NewTarget {
        org_id: ctx.org_id,
        name: "auditor".into(),
        owner_type: MemberType::User,
        owner_ref: Some(people.owner),
        is_requestable: true,
        is_required_attachment: true,
        is_required_comment: true,
    };
    let strict = role_repo::insert_role(&ctx.db, draft.clone()).await.unwrap();
    let mut cmd = grant_for(people.requestor, people.employee, strict.id);
    cmd.comment = Some("   ".into());
    let err = grants.create_grant_request(cmd).await.unwrap_err();
    let client = err.client().cloned().unwrap();
    assert_eq!(client.code, "REQUIRED");
    let fields: Vec<_> = client.fields.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(fields, vec!["attachment", "comment"]);

    draft.name = "closed".into();
    draft.is_requestable = false;
    let closed = role_repo::insert_role(&ctx.db, draft).await.unwrap();
    let err = grants
        .create_grant_request(grant_for(people.requestor, people.employee, closed.id))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("CONSTRAINT_VIOLATED", "targetRef".into()));

    let role = ctx.role("ap-clerk", Some((MemberType::User, people.owner))).await;
    let err = grants
        .create_grant_request(grant_for(people.requestor, Uuid::new_v4(), role.id))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("NOT_FOUND", "receiverRef".into()));
}

#[tokio::test]
async fn owner_is_first_approver_without_a_manager() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    let role = ctx.role("ap-clerk", Some((MemberType::User, people.owner))).await;

    let request = ctx
        .engine
        .grants
        .create_grant_request(grant_for(people.requestor, people.requestor, role.id))
        .await
        .unwrap();
    assert_eq!(request.approval_id, Some(people.owner));
    assert_eq!(ctx.notifier.last().unwrap().recipients, vec![people.owner]);
}

#[tokio::test]
async fn inactive_managers_are_skipped() {
    let ctx = setup().await;
    let top = ctx.hierarchy("ops", None).await;
    let team = ctx.hierarchy("ops-floor", Some(top)).await;
    ctx.user_with_status("gone@acme.test", Some(top), false).await;
    let employee = ctx.user("worker@acme.test", Some(team)).await;
    let owner = ctx.user("boss@acme.test", None).await;
    let role = ctx.role("forklift", Some((MemberType::User, owner))).await;

    let request = ctx
        .engine
        .grants
        .create_grant_request(grant_for(employee, employee, role.id))
        .await
        .unwrap();
    assert_eq!(request.approval_id, Some(owner));
}

#[tokio::test]
async fn request_without_any_approver_is_refused() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    let role = ctx.role("orphan", None).await;

    let err = ctx
        .engine
        .grants
        .create_grant_request(grant_for(people.requestor, people.requestor, role.id))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("CONSTRAINT_VIOLATED", "targetRef".into()));
}

#[tokio::test]
async fn request_for_ownerless_role_is_refused_even_with_a_manager() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    let role = ctx.role("no-owner", None).await;

    let err = ctx
        .engine
        .grants
        .create_grant_request(grant_for(people.requestor, people.employee, role.id))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("CONSTRAINT_VIOLATED", "targetRef".into()));
    assert!(ctx.notifier.sent().is_empty());
}

#[tokio::test]
async fn manager_approval_stays_pending_when_owner_group_empties() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    let approver = ctx.user("approver@acme.test", None).await;
    let owners = ctx.group("finance-admins", &[approver]).await;
    let role = ctx.role("ap-clerk", Some((MemberType::Group, owners))).await;
    let grants = &ctx.engine.grants;

    let request = grants
        .create_grant_request(grant_for(people.requestor, people.employee, role.id))
        .await
        .unwrap();
    ctx.leave_group(owners, approver).await;

    let after_manager = grants
        .respond_to_grant_request(respond(request.id, people.manager, Decision::Approve, &request.etag))
        .await
        .unwrap();
    assert_eq!(after_manager.status, RequestStatus::Pending);
    assert_eq!(after_manager.approval_id, Some(owners));
    assert_eq!(ctx.notifier.last().unwrap().kind, NotificationKind::ApprovalRequested);
}

#[tokio::test]
async fn responses_are_checked_for_authority_etag_and_repeats() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    let role = ctx.role("ap-clerk", Some((MemberType::User, people.owner))).await;
    let grants = &ctx.engine.grants;
    let request = grants
        .create_grant_request(grant_for(people.requestor, people.employee, role.id))
        .await
        .unwrap();

    let err = grants
        .respond_to_grant_request(respond(request.id, people.requestor, Decision::Approve, &request.etag))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("FORBIDDEN", "responderId".into()));

    let err = grants
        .respond_to_grant_request(respond(request.id, people.manager, Decision::Approve, "stale"))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("ETAG_MISMATCH", "etag".into()));

    let after_manager = grants
        .respond_to_grant_request(respond(request.id, people.manager, Decision::Approve, &request.etag))
        .await
        .unwrap();
    let err = grants
        .respond_to_grant_request(respond(
            request.id,
            people.manager,
            Decision::Approve,
            &after_manager.etag,
        ))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("ALREADY_EXISTS", "responderId".into()));

    let err = grants
        .respond_to_grant_request(respond(Uuid::new_v4(), people.owner, Decision::Approve, "x"))
        .await
        .unwrap_err();
    assert_eq!(client_code(err), ("NOT_FOUND", "requestId".into()));
}

#[tokio::test]
async fn group_owner_members_can_give_final_approval() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    let approver = ctx.user("approver@acme.test", None).await;
    let owners = ctx.group("finance-admins", &[approver]).await;
    let role = ctx.role("ap-clerk", Some((MemberType::Group, owners))).await;
    let grants = &ctx.engine.grants;

    let request = grants
        .create_grant_request(grant_for(people.requestor, people.employee, role.id))
        .await
        .unwrap();
    let escalated = grants
        .respond_to_grant_request(respond(request.id, people.manager, Decision::Approve, &request.etag))
        .await
        .unwrap();
    assert_eq!(escalated.approval_id, Some(owners));
    assert_eq!(ctx.notifier.last().unwrap().recipients, vec![approver]);

    let approved = grants
        .respond_to_grant_request(respond(request.id, approver, Decision::Approve, &escalated.etag))
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
}

#[tokio::test]
async fn suite_grant_derives_entitlements_of_member_roles() {
    let ctx = setup().await;
    let people = staff(&ctx).await;
    ctx.resource("invoice", None, &["approve"]).await;
    let entitlement = ctx.entitlement("invoice", "approve", None).await;
    let role = ctx.role("ap-clerk", None).await;
    ctx.assign(entitlement.id, SubjectType::Role, role.id).await;
    let suite = ctx
        .suite("finance", Some((MemberType::User, people.owner)), &[role.id])
        .await;

    let mut cmd = grant_for(people.requestor, people.requestor, suite.id);
    cmd.target_type = TargetType::RoleSuite;
    let request = ctx.engine.grants.create_grant_request(cmd).await.unwrap();
    ctx.engine
        .grants
        .respond_to_grant_request(respond(request.id, people.owner, Decision::Approve, &request.etag))
        .await
        .unwrap();

    assert_eq!(
        ctx.engine
            .authorize
            .is_authorized(approve_query(people.requestor))
            .await
            .unwrap(),
        AccessDecision::Allow
    );
    assert_eq!(ctx.notifier.last().unwrap().kind, NotificationKind::GrantApproved);
}
