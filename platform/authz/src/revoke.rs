use std::sync::Arc;

use entity::kinds::{HistoryEvent, MemberType};
use entity::revoke_requests;
use platform_api::{ClientError, FieldErrorKind, ValidationErrors};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::instrument;
use uuid::Uuid;

use crate::approval;
use crate::error::{Fault, ServiceResult};
use crate::model::{CreateRevokeRequest, Subject};
use crate::ports::{Notification, NotificationKind, Notifier};
use crate::repo::history::{self, HistoryContext};
use crate::repo::requests::{self, NewRequest};
use crate::repo::roles::Member;
use crate::validation::{Sanitizer, Validator};

/// Immediate removal of a role or suite from its holder.
#[derive(Clone)]
pub struct RevokeRequestService {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    validator: Validator,
    sanitizer: Sanitizer,
}

impl RevokeRequestService {
    pub fn new(
        db: DatabaseConnection,
        notifier: Arc<dyn Notifier>,
        validator: Validator,
        sanitizer: Sanitizer,
    ) -> Self {
        Self {
            db,
            notifier,
            validator,
            sanitizer,
        }
    }

    #[instrument(
        name = "authz.create_revoke_request",
        skip_all,
        fields(target_ref = %cmd.target_ref, receiver_ref = %cmd.receiver_ref)
    )]
    pub async fn create_revoke_request(
        &self,
        cmd: CreateRevokeRequest,
    ) -> ServiceResult<revoke_requests::Model> {
        self.create(cmd)
            .await
            .map_err(|fault| fault.during("create revoke request"))
    }

    #[instrument(name = "authz.get_revoke_request", skip_all, fields(request_id = %id))]
    pub async fn get_revoke_request(&self, id: Uuid) -> ServiceResult<revoke_requests::Model> {
        self.load(id)
            .await
            .map_err(|fault| fault.during("load revoke request"))
    }

    async fn load(&self, id: Uuid) -> Result<revoke_requests::Model, Fault> {
        requests::find_revoke(&self.db, id).await?.ok_or_else(|| {
            ClientError::field(
                "requestId",
                FieldErrorKind::NotFound,
                format!("revoke request {id} does not exist"),
            )
            .into()
        })
    }

    async fn create(&self, cmd: CreateRevokeRequest) -> Result<revoke_requests::Model, Fault> {
        let cmd = CreateRevokeRequest {
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
        let receiver: Member = (cmd.receiver_type, cmd.receiver_ref);
        if !approval::holds_target(&self.db, &target, receiver).await? {
            return Err(ClientError::field(
                "receiverRef",
                FieldErrorKind::NotFound,
                format!("receiver does not hold {}", target.name),
            )
            .into());
        }

        let subject = Subject::member(cmd.receiver_type, cmd.receiver_ref);
        let requestor_id = cmd.requestor_id;
        let new = NewRequest {
            requestor_id: cmd.requestor_id,
            receiver_type: cmd.receiver_type,
            receiver_ref: cmd.receiver_ref,
            target_type: cmd.target_type,
            target_ref: cmd.target_ref,
            attachment: cmd.attachment,
            comment: cmd.comment,
        };

        let txn = self.db.begin().await?;
        let request = requests::create_revoke(&txn, new).await?;
        approval::apply_membership(&txn, &target, receiver, false).await?;
        let report = approval::sync_derived_assignments(&txn, receiver).await?;
        let effects = approval::history_effects(&txn, &report.removed, false).await?;
        history::record(
            &txn,
            HistoryContext {
                event: HistoryEvent::Revoked,
                request_id: Some(request.id),
                actor_id: requestor_id,
                subject: &subject,
                target: &target,
            },
            effects,
        )
        .await?;
        txn.commit().await?;

        tracing::info!(
            request_id = %request.id,
            removed = report.removed.len(),
            "access revoked"
        );
        let mut recipients = vec![requestor_id];
        if cmd.receiver_type == MemberType::User {
            recipients.push(cmd.receiver_ref);
        }
        self.notifier
            .notify(Notification::new(
                NotificationKind::AccessRevoked,
                request.id,
                recipients,
            ))
            .await;
        Ok(request)
    }
}
