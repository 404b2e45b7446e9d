use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// ApiError
///
/// The application-wide error taxonomy. Every handler returns `ApiResult<T>`,
/// and every variant maps to a conventional HTTP status code while the body
/// stays the uniform `{success: false, message}` envelope that the storefront
/// client pattern-matches on.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Registration attempted with an email that already has an account.
    #[error("User already exists")]
    DuplicateIdentity,

    /// Client-supplied input failed validation (malformed email, weak password,
    /// uncoercible form field, empty cart at checkout, ...).
    #[error("{0}")]
    Validation(String),

    /// Login attempted against an email with no account.
    #[error("User doesn't exist")]
    UserNotFound,

    /// Password verification or admin credential comparison failed.
    #[error("Invalid credentials")]
    InvalidCredential,

    /// Missing, malformed, expired, or otherwise unverifiable session token.
    #[error("Not authorized, login again")]
    Unauthenticated,

    /// The referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Cart update addressed an item/size pair that was never added.
    #[error("Item is not in the cart")]
    ItemNotInCart,

    /// Order status change outside the allowed state machine.
    #[error("Illegal order status transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    /// Image push to the object store failed.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Payment provider call failed or came back unpaid.
    #[error("Payment error: {0}")]
    Payment(String),

    /// Underlying database failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Anything that should never happen in a healthy deployment.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Maps each variant to its HTTP status code. Client-caused failures are
    /// 4xx, downstream/server failures are 5xx.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::DuplicateIdentity => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::UserNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidCredential => StatusCode::UNAUTHORIZED,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ItemNotInCart => StatusCode::BAD_REQUEST,
            ApiError::IllegalTransition { .. } => StatusCode::CONFLICT,
            ApiError::Upload(_) => StatusCode::BAD_GATEWAY,
            ApiError::Payment(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// ErrorBody
///
/// The failure half of the response envelope contract.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Server-caused failures get logged with the underlying detail;
        // client-caused ones only show up at debug level.
        if status.is_server_error() || matches!(self, ApiError::Upload(_) | ApiError::Payment(_)) {
            tracing::error!("request failed: {:?}", self);
        } else {
            tracing::debug!("request rejected: {:?}", self);
        }

        let body = ErrorBody {
            success: false,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result alias used by all handlers and the repository layer.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(
            ApiError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::DuplicateIdentity.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Unauthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::ItemNotInCart.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn downstream_errors_map_to_5xx() {
        assert_eq!(
            ApiError::Upload("s3 down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_match_the_envelope_contract() {
        assert_eq!(ApiError::DuplicateIdentity.to_string(), "User already exists");
        assert_eq!(ApiError::UserNotFound.to_string(), "User doesn't exist");
        assert_eq!(ApiError::InvalidCredential.to_string(), "Invalid credentials");
    }
}
