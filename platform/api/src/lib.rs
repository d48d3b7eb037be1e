use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use thiserror::Error;

mod validation;

pub use validation::{ClientError, FieldError, FieldErrorKind, ValidationErrors};

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error(transparent)]
    Client(ClientError),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Client(err) => err.code,
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<ClientError> for ApiError {
    fn from(value: ClientError) -> Self {
        Self::Client(value)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::Client(client) = self {
            if let Ok(fields) = async_graphql::to_value(&client.fields) {
                err = err.extend_with(|_err, e| {
                    e.set("fields", fields);
                });
            }
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}
