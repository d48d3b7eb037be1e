use platform_api::{ClientError, ValidationErrors};
use sea_orm::DbErr;
use thiserror::Error;

/// Infrastructure failure underneath a service call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("identity lookup failed: {0}")]
    Identity(String),
}

/// Result of a public service method.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The caller can fix the input and resubmit.
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to {action}")]
    Internal {
        action: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ServiceError {
    pub fn client(&self) -> Option<&ClientError> {
        match self {
            ServiceError::Client(err) => Some(err),
            ServiceError::Internal { .. } => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Internal failure channel; converted once at the service boundary.
#[derive(Debug)]
pub(crate) enum Fault {
    Client(ClientError),
    Store(StoreError),
}

impl Fault {
    pub(crate) fn during(self, action: &'static str) -> ServiceError {
        match self {
            Fault::Client(err) => ServiceError::Client(err),
            Fault::Store(source) => {
                tracing::error!(action, error = %source, "service call failed");
                ServiceError::Internal { action, source }
            }
        }
    }
}

impl From<ClientError> for Fault {
    fn from(value: ClientError) -> Self {
        Fault::Client(value)
    }
}

impl From<ValidationErrors> for Fault {
    fn from(value: ValidationErrors) -> Self {
        Fault::Client(value.into_client_error())
    }
}

impl From<StoreError> for Fault {
    fn from(value: StoreError) -> Self {
        Fault::Store(value)
    }
}

impl From<DbErr> for Fault {
    fn from(value: DbErr) -> Self {
        Fault::Store(StoreError::Database(value))
    }
}

/// Map a unique violation onto a client error, leave everything else as a store fault.
pub(crate) fn unique_as(err: DbErr, conflict: impl FnOnce() -> ClientError) -> Fault {
    if platform_db::is_unique_violation(&err) {
        Fault::Client(conflict())
    } else {
        Fault::from(err)
    }
}
