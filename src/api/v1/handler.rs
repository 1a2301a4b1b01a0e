use super::cookie::SessionCookies;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::http::StatusCode;
use warp::{Rejection, Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Already-admitted caller plus the raw access token it presented.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub context: AuthContext,
    pub access_token: String,
}

fn respond<T: Serialize>(
    status: StatusCode,
    body: T,
    cookies: Vec<String>,
) -> Result<warp::reply::Response, Rejection> {
    let mut response = warp::reply::json(&ApiResponse::ok(body)).into_response();
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for cookie in cookies {
        let value = HeaderValue::from_str(&cookie)
            .map_err(ApiErrorCode::internal)
            .map_err(reject::custom)?;
        headers.append(SET_COOKIE, value);
    }
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl From<&AuthTokens> for SessionResponse {
    fn from(tokens: &AuthTokens) -> Self {
        SessionResponse {
            access_token_expires_at: tokens.access_token_expires_at,
            refresh_token_expires_at: tokens.refresh_token_expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

pub async fn signup(
    body: SignupRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl Reply, Rejection> {
    let signup_input = SignupInput {
        email: body.email,
        password: body.password,
        name: body.name,
    };
    let user = auth_service
        .signup(signup_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    respond(StatusCode::CREATED, user, Vec::new())
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserSummary,
    pub session: SessionResponse,
    pub remember_me: bool,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    session_cookies: Arc<SessionCookies>,
) -> Result<impl Reply, Rejection> {
    let login_input = LoginInput {
        email: body.email,
        password: body.password,
        remember_me: body.remember_me,
    };
    let login_result = auth_service
        .login(login_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let cookies = session_cookies
        .issue(&login_result.tokens)
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;
    let login_response = LoginResponse {
        session: SessionResponse::from(&login_result.tokens),
        user: login_result.user,
        remember_me: login_result.remember_me,
    };

    respond(StatusCode::OK, login_response, cookies)
}

pub async fn refresh(
    refresh_token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    session_cookies: Arc<SessionCookies>,
) -> Result<impl Reply, Rejection> {
    let refresh_token = refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| reject::custom(ApiErrorCode::Unauthorized))?;

    let tokens = auth_service
        .refresh_token(&refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let cookies = session_cookies
        .issue(&tokens)
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    respond(StatusCode::OK, SessionResponse::from(&tokens), cookies)
}

pub async fn logout(
    caller: Authenticated,
    refresh_token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    session_cookies: Arc<SessionCookies>,
) -> Result<impl Reply, Rejection> {
    auth_service
        .logout(&caller.access_token, refresh_token.as_deref())
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    respond(StatusCode::OK, (), session_cookies.cleared())
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    body: PasswordChangeRequest,
    caller: Authenticated,
    auth_service: Arc<dyn AuthService>,
    session_cookies: Arc<SessionCookies>,
) -> Result<impl Reply, Rejection> {
    let request = PasswordChangeInput {
        user_id: caller.context.user_id,
        current_password: body.current_password,
        new_password: body.new_password,
    };
    auth_service
        .update_password(request)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    // every session, this one included, is gone
    respond(StatusCode::OK, (), session_cookies.cleared())
}

pub async fn me(
    caller: Authenticated,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl Reply, Rejection> {
    let user = auth_service
        .profile(caller.context.user_id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    respond(StatusCode::OK, user, Vec::new())
}
