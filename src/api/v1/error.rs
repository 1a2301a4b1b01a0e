use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, error, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, status) = if let Some(code) = err.find::<ApiErrorCode>() {
        (code.clone(), code.status())
    } else if err.is_not_found() {
        (ApiErrorCode::NotFound, StatusCode::NOT_FOUND)
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        (ApiErrorCode::BadRequest, StatusCode::BAD_REQUEST)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (ApiErrorCode::NotFound, StatusCode::METHOD_NOT_ALLOWED)
    } else {
        error!("Unhandled rejection: {:?}", err);
        (ApiErrorCode::InternalError, StatusCode::INTERNAL_SERVER_ERROR)
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
    Ok(warp::reply::with_status(json, status))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Session reuse detected, all sessions were signed out")]
    SessionsRevoked,
    #[error("Email already registered")]
    UserExists,
    #[error("Invalid request")]
    BadRequest,
    #[error("CSRF token missing or invalid")]
    CsrfRejected,
    #[error("Not found")]
    NotFound,
    #[error("Service temporarily unavailable")]
    Unavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::Unauthorized | ApiErrorCode::SessionsRevoked => StatusCode::UNAUTHORIZED,
            ApiErrorCode::UserExists => StatusCode::CONFLICT,
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::CsrfRejected => StatusCode::FORBIDDEN,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error.kind() {
            AuthErrorKind::Unauthorized => match error {
                AuthError::ReuseDetected => ApiErrorCode::SessionsRevoked,
                _ => ApiErrorCode::Unauthorized,
            },
            AuthErrorKind::Conflict => ApiErrorCode::UserExists,
            AuthErrorKind::BadRequest => {
                debug!(error = %error, "request rejected");
                ApiErrorCode::BadRequest
            }
            AuthErrorKind::Unavailable => {
                warn!(error = %error, "dependency unavailable");
                ApiErrorCode::Unavailable
            }
            AuthErrorKind::Internal => ApiErrorCode::internal(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_http_classes() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::TokenRevoked, StatusCode::UNAUTHORIZED),
            (AuthError::ReuseDetected, StatusCode::UNAUTHORIZED),
            (AuthError::UserExists, StatusCode::CONFLICT),
            (AuthError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::Timeout("revocation.get_epoch"), StatusCode::SERVICE_UNAVAILABLE),
            (AuthError::Store("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AuthError::InternalError("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiErrorCode::from(error).status(), status);
        }
        assert_eq!(
            ApiErrorCode::from(AuthError::ReuseDetected),
            ApiErrorCode::SessionsRevoked
        );
    }
}
