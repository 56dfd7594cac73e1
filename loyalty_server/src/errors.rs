use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use loyalty_engine::LedgerApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PaymentRequired(String),
    #[error("Service temporarily unavailable. {0}")]
    ServiceUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No session cookie was provided. Please log in first.")]
    MissingSession,
    #[error("The session cookie is invalid. {0}")]
    InvalidSession(String),
    #[error("Invalid login or password.")]
    InvalidCredentials,
}

impl From<LedgerApiError> for ServerError {
    fn from(e: LedgerApiError) -> Self {
        match e {
            LedgerApiError::InvalidInput(_) => Self::Unprocessable(e.to_string()),
            LedgerApiError::Conflict(_) | LedgerApiError::LoginTaken(_) => Self::Conflict(e.to_string()),
            LedgerApiError::NotFound(s) => Self::NoRecordFound(s),
            LedgerApiError::InsufficientBalance { .. } => Self::PaymentRequired(e.to_string()),
            LedgerApiError::InvalidCredentials => Self::AuthenticationError(AuthError::InvalidCredentials),
            LedgerApiError::TransientUpstream(_) | LedgerApiError::QueueClosed(_) => {
                Self::ServiceUnavailable(e.to_string())
            },
            LedgerApiError::StorageFailure(s) => {
                error!("💻️ Storage failure while handling a request. {s}");
                Self::BackendError(s)
            },
        }
    }
}

#[cfg(test)]
mod test {
    use loyalty_common::Points;

    use super::*;

    #[test]
    fn ledger_errors_map_to_status_codes() {
        let status = |e: LedgerApiError| ServerError::from(e).status_code();
        let number = "12345678903".parse().unwrap();
        assert_eq!(status(LedgerApiError::InvalidInput("x".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(LedgerApiError::Conflict(number)), StatusCode::CONFLICT);
        assert_eq!(status(LedgerApiError::LoginTaken("alice".into())), StatusCode::CONFLICT);
        assert_eq!(
            status(LedgerApiError::InsufficientBalance {
                requested: Points::from_whole(400),
                available: Points::from_whole(100)
            }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(status(LedgerApiError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(LedgerApiError::StorageFailure("disk".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(LedgerApiError::NotFound("User #1".into())), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_body_is_json() {
        let res = ServerError::Conflict("taken".into()).error_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(res.headers().get("content-type").unwrap(), "application/json");
    }
}
