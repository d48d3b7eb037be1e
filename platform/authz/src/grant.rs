use std::sync::Arc;

use entity::kinds::{Decision, HistoryEvent, MemberType, RequestStatus};
use entity::{grant_requests, grant_responses};
use platform_api::{ClientError, FieldErrorKind, ValidationErrors};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::instrument;
use uuid::Uuid;

use crate::approval::{self, ApproverRole, Approvers};
use crate::error::{Fault, ServiceResult, unique_as};
use crate::model::{CreateGrantRequest, RespondToGrantRequest, Subject, Target};
use crate::ports::{IdentityLookup, Notification, NotificationKind, Notifier};
use crate::repo::history::{self, HistoryContext};
use crate::repo::requests::{self, NewRequest};
use crate::repo::roles::Member;
use crate::validation::{Sanitizer, Validator};

/// A grant request with every response recorded so far.
#[derive(Clone, Debug, PartialEq)]
pub struct GrantRequestDetail {
    pub request: grant_requests::Model,
    pub responses: Vec<grant_responses::Model>,
}

/// Creation and approval of requests for a role or role suite.
#[derive(Clone)]
pub struct GrantRequestService {
    db: DatabaseConnection,
    identity: Arc<dyn IdentityLookup>,
    notifier: Arc<dyn Notifier>,
    validator: Validator,
    sanitizer: Sanitizer,
}

impl GrantRequestService {
    pub fn new(
        db: DatabaseConnection,
        identity: Arc<dyn IdentityLookup>,
        notifier: Arc<dyn Notifier>,
        validator: Validator,
        sanitizer: Sanitizer,
    ) -> Self {
        Self {
            db,
            identity,
            notifier,
            validator,
            sanitizer,
        }
    }

    #[instrument(
        name = "authz.create_grant_request",
        skip_all,
        fields(target_ref = %cmd.target_ref, receiver_ref = %cmd.receiver_ref)
    )]
    pub async fn create_grant_request(
        &self,
        cmd: CreateGrantRequest,
    ) -> ServiceResult<grant_requests::Model> {
        self.create(cmd)
            .await
            .map_err(|fault| fault.during("create grant request"))
    }

    #[instrument(
        name = "authz.respond_to_grant_request",
        skip_all,
        fields(request_id = %cmd.request_id, decision = ?cmd.decision)
    )]
    pub async fn respond_to_grant_request(
        &self,
        cmd: RespondToGrantRequest,
    ) -> ServiceResult<grant_requests::Model> {
        self.respond(cmd)
            .await
            .map_err(|fault| fault.during("respond to grant request"))
    }

    #[instrument(name = "authz.get_grant_request", skip_all, fields(request_id = %id))]
    pub async fn get_grant_request(&self, id: Uuid) -> ServiceResult<GrantRequestDetail> {
        self.detail(id)
            .await
            .map_err(|fault| fault.during("load grant request"))
    }

    async fn detail(&self, id: Uuid) -> Result<GrantRequestDetail, Fault> {
        let request = requests::find_grant(&self.db, id)
            .await?
            .ok_or_else(|| request_not_found(id))?;
        let responses = requests::responses_for(&self.db, id).await?;
        Ok(GrantRequestDetail { request, responses })
    }

    async fn create(&self, cmd: CreateGrantRequest) -> Result<grant_requests::Model, Fault> {
        let cmd = CreateGrantRequest {
            attachment: self.sanitizer.text(cmd.attachment),
            comment: self.sanitizer.text(cmd.comment),
            ..cmd
        };

        let mut errors = ValidationErrors::new();
        self.validator
            .id(&mut errors, "requestorId", cmd.requestor_id);
        self.validator
            .id(&mut errors, "receiverRef", cmd.receiver_ref);
        self.validator.id(&mut errors, "targetRef", cmd.target_ref);
        self.validator
            .text(&mut errors, "attachment", cmd.attachment.as_deref());
        self.validator
            .text(&mut errors, "comment", cmd.comment.as_deref());
        errors.into_result()?;

        let target = approval::load_target(&self.db, cmd.target_type, cmd.target_ref).await?;
        let mut errors = ValidationErrors::new();
        if !target.is_requestable {
            errors.constraint_violated(
                "targetRef",
                format!("{} is not open for requests", target.name),
            );
        }
        if target.is_required_attachment && cmd.attachment.is_none() {
            errors.required("attachment");
        }
        if target.is_required_comment && cmd.comment.is_none() {
            errors.required("comment");
        }
        errors.into_result()?;

        let receiver: Member = (cmd.receiver_type, cmd.receiver_ref);
        self.ensure_receiver(receiver).await?;

        if approval::holds_target(&self.db, &target, receiver).await? {
            return Err(ClientError::field(
                "targetRef",
                FieldErrorKind::AlreadyExists,
                format!("receiver already holds {}", target.name),
            )
            .into());
        }
        let pending = requests::find_pending_by_receiver_and_target(
            &self.db,
            cmd.receiver_type,
            cmd.receiver_ref,
            cmd.target_type,
            cmd.target_ref,
        )
        .await?;
        if pending.is_some() {
            return Err(pending_exists(&target).into());
        }

        let approvers =
            approval::resolve_approvers(self.identity.as_ref(), receiver, &target).await?;
        let (approval_id, recipients) = first_approver(&approvers).ok_or_else(|| {
            ClientError::field(
                "targetRef",
                FieldErrorKind::ConstraintViolated,
                format!("{} has no owner who could approve", target.name),
            )
        })?;

        let new = NewRequest {
            requestor_id: cmd.requestor_id,
            receiver_type: cmd.receiver_type,
            receiver_ref: cmd.receiver_ref,
            target_type: cmd.target_type,
            target_ref: cmd.target_ref,
            attachment: cmd.attachment,
            comment: cmd.comment,
        };
        let request = requests::create_grant(&self.db, new, Some(approval_id))
            .await
            .map_err(|err| unique_as(err, || pending_exists(&target)))?;

        tracing::info!(
            request_id = %request.id,
            approval_id = %approval_id,
            "grant request created"
        );
        self.notify(NotificationKind::ApprovalRequested, request.id, recipients)
            .await;
        Ok(request)
    }

    async fn ensure_receiver(&self, receiver: Member) -> Result<(), Fault> {
        let exists = match receiver {
            (MemberType::User, id) => self.identity.user_exists(id).await?,
            (MemberType::Group, id) => self.identity.group_exists(id).await?,
        };
        if exists {
            return Ok(());
        }
        let label = match receiver.0 {
            MemberType::User => "user",
            MemberType::Group => "group",
        };
        Err(ClientError::field(
            "receiverRef",
            FieldErrorKind::NotFound,
            format!("{label} {} does not exist", receiver.1),
        )
        .into())
    }

    async fn respond(&self, cmd: RespondToGrantRequest) -> Result<grant_requests::Model, Fault> {
        let comment = self.sanitizer.text(cmd.comment.clone());
        let mut errors = ValidationErrors::new();
        self.validator.id(&mut errors, "requestId", cmd.request_id);
        self.validator
            .id(&mut errors, "responderId", cmd.responder_id);
        self.validator.etag(&mut errors, "etag", &cmd.etag);
        self.validator
            .text(&mut errors, "comment", comment.as_deref());
        errors.into_result()?;

        let request = requests::find_grant(&self.db, cmd.request_id)
            .await?
            .ok_or_else(|| request_not_found(cmd.request_id))?;
        if request.status != RequestStatus::Pending {
            return Err(ClientError::field(
                "requestId",
                FieldErrorKind::InvalidState,
                format!("request is already {}", status_label(request.status)),
            )
            .into());
        }
        if !platform_db::etag_matches(&request.etag, &cmd.etag) {
            let mut errors = ValidationErrors::new();
            errors.etag_mismatch("etag");
            return Err(errors.into());
        }

        let target = approval::load_target(&self.db, request.target_type, request.target_ref).await?;
        let receiver: Member = (request.receiver_type, request.receiver_ref);
        let approvers =
            approval::resolve_approvers(self.identity.as_ref(), receiver, &target).await?;
        let role = approval::classify_approver(cmd.responder_id, approvers.manager, &approvers.owners);
        if role == ApproverRole::None {
            return Err(ClientError::field(
                "responderId",
                FieldErrorKind::Forbidden,
                "responder is neither the receiver's manager nor the target owner",
            )
            .into());
        }
        if requests::find_response(&self.db, request.id, cmd.responder_id)
            .await?
            .is_some()
        {
            return Err(already_responded().into());
        }

        let response = Response {
            responder_id: cmd.responder_id,
            decision: cmd.decision,
            comment,
        };
        match cmd.decision {
            Decision::Deny => self.reject(request, response).await,
            Decision::Approve if role.is_final() => self.finalize(request, &target, response).await,
            Decision::Approve => self.escalate(request, &approvers, response).await,
        }
    }

    async fn reject(
        &self,
        request: grant_requests::Model,
        response: Response,
    ) -> Result<grant_requests::Model, Fault> {
        let txn = self.db.begin().await?;
        record_response(&txn, request.id, &response).await?;
        let updated = requests::update_grant(
            &txn,
            request.id,
            &request.etag,
            RequestStatus::Rejected,
            request.approval_id,
        )
        .await?
        .ok_or_else(etag_conflict)?;
        txn.commit().await?;

        tracing::info!(request_id = %updated.id, "grant request rejected");
        self.notify(
            NotificationKind::GrantRejected,
            updated.id,
            vec![updated.requestor_id],
        )
        .await;
        Ok(updated)
    }

    /// Manager approved; hand the request to the owner.
    async fn escalate(
        &self,
        request: grant_requests::Model,
        approvers: &Approvers,
        response: Response,
    ) -> Result<grant_requests::Model, Fault> {
        let txn = self.db.begin().await?;
        record_response(&txn, request.id, &response).await?;
        let updated = requests::update_grant(
            &txn,
            request.id,
            &request.etag,
            RequestStatus::Pending,
            approvers.owner_ref,
        )
        .await?
        .ok_or_else(etag_conflict)?;
        txn.commit().await?;

        tracing::info!(
            request_id = %updated.id,
            "manager approved, waiting for owner"
        );
        self.notify(
            NotificationKind::FinalApprovalPending,
            updated.id,
            approvers.owners.clone(),
        )
        .await;
        Ok(updated)
    }

    async fn finalize(
        &self,
        request: grant_requests::Model,
        target: &Target,
        response: Response,
    ) -> Result<grant_requests::Model, Fault> {
        let receiver: Member = (request.receiver_type, request.receiver_ref);
        let subject = Subject::member(request.receiver_type, request.receiver_ref);

        let txn = self.db.begin().await?;
        record_response(&txn, request.id, &response).await?;
        let updated = requests::update_grant(
            &txn,
            request.id,
            &request.etag,
            RequestStatus::Approved,
            request.approval_id,
        )
        .await?
        .ok_or_else(etag_conflict)?;
        approval::apply_membership(&txn, target, receiver, true).await?;
        let report = approval::sync_derived_assignments(&txn, receiver).await?;
        let effects = approval::history_effects(&txn, &report.added, true).await?;
        history::record(
            &txn,
            HistoryContext {
                event: HistoryEvent::Granted,
                request_id: Some(request.id),
                actor_id: response.responder_id,
                subject: &subject,
                target,
            },
            effects,
        )
        .await?;
        txn.commit().await?;

        tracing::info!(
            request_id = %updated.id,
            assignments = report.added.len(),
            "grant request approved"
        );
        let mut recipients = vec![updated.requestor_id];
        if updated.receiver_type == MemberType::User {
            recipients.push(updated.receiver_ref);
        }
        self.notify(NotificationKind::GrantApproved, updated.id, recipients)
            .await;
        Ok(updated)
    }

    async fn notify(&self, kind: NotificationKind, request_id: Uuid, recipients: Vec<Uuid>) {
        let notification = Notification::new(kind, request_id, recipients);
        if notification.recipients.is_empty() {
            return;
        }
        self.notifier.notify(notification).await;
    }
}

struct Response {
    responder_id: Uuid,
    decision: Decision,
    comment: Option<String>,
}

/// Manager first, then the owner. `None` when no owner could give the final
/// approval.
fn first_approver(approvers: &Approvers) -> Option<(Uuid, Vec<Uuid>)> {
    let owner_ref = approvers.owner_ref.filter(|_| !approvers.owners.is_empty())?;
    match approvers.manager {
        Some(manager) => Some((manager, vec![manager])),
        None => Some((owner_ref, approvers.owners.clone())),
    }
}

async fn record_response<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    response: &Response,
) -> Result<(), Fault> {
    requests::create_response(
        conn,
        request_id,
        response.responder_id,
        response.decision,
        response.comment.clone(),
    )
    .await
    .map_err(|err| unique_as(err, already_responded))?;
    Ok(())
}

fn request_not_found(id: Uuid) -> Fault {
    ClientError::field(
        "requestId",
        FieldErrorKind::NotFound,
        format!("grant request {id} does not exist"),
    )
    .into()
}

fn pending_exists(target: &Target) -> ClientError {
    ClientError::field(
        "targetRef",
        FieldErrorKind::AlreadyExists,
        format!("a pending request for {} already exists", target.name),
    )
}

fn already_responded() -> ClientError {
    ClientError::field(
        "responderId",
        FieldErrorKind::AlreadyExists,
        "responder has already responded to this request",
    )
}

fn etag_conflict() -> Fault {
    let mut errors = ValidationErrors::new();
    errors.etag_mismatch("etag");
    errors.into()
}

fn status_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "pending",
        RequestStatus::Approved => "approved",
        RequestStatus::Rejected => "rejected",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_is_preferred_over_owner() {
        let manager = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let approvers = Approvers {
            manager: Some(manager),
            owner_ref: Some(owner),
            owners: vec![owner],
        };
        assert_eq!(first_approver(&approvers), Some((manager, vec![manager])));
    }

    #[test]
    fn group_owner_routes_to_members() {
        let group = Uuid::new_v4();
        let members = vec![Uuid::new_v4(), Uuid::new_v4()];
        let approvers = Approvers {
            manager: None,
            owner_ref: Some(group),
            owners: members.clone(),
        };
        assert_eq!(first_approver(&approvers), Some((group, members)));
    }

    #[test]
    fn nobody_to_approve() {
        assert_eq!(first_approver(&Approvers::default()), None);
        let empty_group = Approvers {
            manager: None,
            owner_ref: Some(Uuid::new_v4()),
            owners: Vec::new(),
        };
        assert_eq!(first_approver(&empty_group), None);
    }
}
