use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or the presented credentials were rejected
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// The user directory could not answer a role lookup made while authorizing a request.
    ///
    /// Clients see the same empty 401 as any other denial; operators see an error-level log line
    /// and a [`LookupUnavailable`] marker on the response.
    #[error("User lookup failed: {0}")]
    UserLookup(#[source] DbError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Response extension marking a denial caused by an unavailable user directory rather than by the
/// presented credentials. Outer layers can use it to retry or alert; it never reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupUnavailable;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } | Error::UserLookup(_) => StatusCode::UNAUTHORIZED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details.
    ///
    /// Authorization failures carry no message unless a handler supplied one explicitly.
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_default(),
            Error::UserLookup(_) => String::new(),
            Error::BadRequest { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::Unavailable(_) => "Service temporarily unavailable".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }

    /// Whether the same request may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::UserLookup(_) => true,
            Error::Database(db_err) => db_err.is_transient(),
            _ => false,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::UserLookup(_) | Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database error: {}", self);
            }
            Error::Unauthenticated { .. } => {
                tracing::debug!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let user_message = self.user_message();

        let mut response = if user_message.is_empty() {
            status.into_response()
        } else {
            (status, user_message).into_response()
        };

        if matches!(self, Error::UserLookup(_)) {
            response.extensions_mut().insert(LookupUnavailable);
        }

        response
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_denials_have_empty_body() {
        let response = Error::Unauthenticated { message: None }.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<LookupUnavailable>().is_none());
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_looks_like_denial() {
        let err = Error::UserLookup(DbError::Unavailable("pool timed out".to_string()));
        assert!(err.is_retryable());

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.extensions().get::<LookupUnavailable>(), Some(&LookupUnavailable));
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_unauthenticated_message() {
        let response = Error::Unauthenticated {
            message: Some("Invalid username or password".to_string()),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(response).await, b"Invalid username or password");
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = Error::Internal {
            operation: "sign session token: bad key".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Internal server error");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_directory_write_errors() {
        let taken = Error::Database(DbError::UniqueViolation {
            constraint: Some("users_pkey".to_string()),
            table: Some("users".to_string()),
            message: "username carol is already taken".to_string(),
        });
        assert_eq!(taken.status_code(), StatusCode::CONFLICT);
        assert_eq!(taken.user_message(), "Resource already exists");

        let missing = Error::Database(DbError::NotFound);
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let down = Error::Database(DbError::Unavailable("pool closed".to_string()));
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(down.is_retryable());
    }

    #[test]
    fn test_bad_request_message_is_shown() {
        let err = Error::BadRequest {
            message: "User registration is disabled".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "User registration is disabled");
    }
}
