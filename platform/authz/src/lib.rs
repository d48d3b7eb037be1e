//! Authorization decisions and the access-request workflow for ERP modules.
//!
//! [`AuthorizeService`] answers "may this subject do that" from stored
//! entitlement assignments. [`GrantRequestService`] and
//! [`RevokeRequestService`] move role and suite memberships through their
//! approval workflow, keeping derived assignments and permission history in
//! step. [`EntitlementService`] maintains the catalog those decisions read.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub mod approval;
pub mod authorize;
pub mod config;
mod entitlements;
mod error;
pub mod expr;
mod grant;
pub mod identity;
pub mod matcher;
pub mod model;
pub mod ports;
pub mod repo;
mod revoke;
pub mod subject;
pub mod validation;

pub use authorize::AuthorizeService;
pub use config::{AuthzConfig, ConfigError};
pub use entitlements::EntitlementService;
pub use error::{ServiceError, ServiceResult, StoreError};
pub use grant::{GrantRequestDetail, GrantRequestService};
pub use identity::SeaOrmIdentity;
pub use ports::{IdentityLookup, LogNotifier, Notification, NotificationKind, Notifier};
pub use revoke::RevokeRequestService;
pub use validation::{Sanitizer, Validator};

/// Every service wired against one pool and one set of collaborators.
#[derive(Clone)]
pub struct AccessEngine {
    pub authorize: AuthorizeService,
    pub grants: GrantRequestService,
    pub revokes: RevokeRequestService,
    pub entitlements: EntitlementService,
}

impl AccessEngine {
    pub fn new(
        db: DatabaseConnection,
        identity: Arc<dyn IdentityLookup>,
        notifier: Arc<dyn Notifier>,
        config: &AuthzConfig,
    ) -> Self {
        let validator = Validator::new(config);
        let sanitizer = Sanitizer;
        Self {
            authorize: AuthorizeService::new(db.clone(), validator.clone()),
            grants: GrantRequestService::new(
                db.clone(),
                identity.clone(),
                notifier.clone(),
                validator.clone(),
                sanitizer.clone(),
            ),
            revokes: RevokeRequestService::new(
                db.clone(),
                notifier,
                validator.clone(),
                sanitizer,
            ),
            entitlements: EntitlementService::new(db, identity, validator),
        }
    }

    /// Identity from the shared tables, notifications to the log.
    pub fn with_defaults(db: DatabaseConnection, config: &AuthzConfig) -> Self {
        let identity = Arc::new(SeaOrmIdentity::new(db.clone()));
        Self::new(db, identity, Arc::new(LogNotifier), config)
    }
}
