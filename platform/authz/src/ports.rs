//! Collaborators the engine consumes but does not own.

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;

/// Read-only view of the identity module.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError>;

    async fn group_exists(&self, group_id: Uuid) -> Result<bool, StoreError>;

    /// Active user one hierarchy level above the given user, if any.
    async fn direct_manager(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    async fn group_members(&self, group_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    /// A new request is waiting for its first approver.
    ApprovalRequested,
    /// The manager approved; the owner still has to.
    FinalApprovalPending,
    GrantApproved,
    GrantRejected,
    AccessRevoked,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub request_id: Uuid,
    pub recipients: Vec<Uuid>,
}

impl Notification {
    /// Repeated recipients are dropped, keeping first occurrences in order.
    pub fn new(kind: NotificationKind, request_id: Uuid, recipients: Vec<Uuid>) -> Self {
        let mut seen = HashSet::new();
        let recipients = recipients
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();
        Self {
            kind,
            request_id,
            recipients,
        }
    }
}

/// Delivery is best effort; the workflow never fails on it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Emits notifications as structured tracing events.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) {
        for recipient in &notification.recipients {
            tracing::info!(
                kind = ?notification.kind,
                request_id = %notification.request_id,
                recipient = %recipient,
                "access request notification"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_are_unique_in_first_seen_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let n = Notification::new(NotificationKind::GrantApproved, Uuid::new_v4(), vec![a, b, a, b, a]);
        assert_eq!(n.recipients, vec![a, b]);
    }
}
