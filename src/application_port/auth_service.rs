use crate::domain_model::{RefreshRecordId, UserId, UserSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("token revoked")]
    TokenRevoked,
    #[error("refresh token reuse detected, all sessions revoked")]
    ReuseDetected,
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error("timed out: {0}")]
    Timeout(&'static str),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Caller-facing classes of [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    Unauthorized,
    Conflict,
    BadRequest,
    Unavailable,
    Internal,
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::InvalidCredentials
            | AuthError::TokenInvalid
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::ReuseDetected => AuthErrorKind::Unauthorized,
            AuthError::UserExists => AuthErrorKind::Conflict,
            AuthError::UserNotFound | AuthError::InvalidInput(_) => AuthErrorKind::BadRequest,
            AuthError::Timeout(_) | AuthError::Store(_) => AuthErrorKind::Unavailable,
            AuthError::InternalError(_) => AuthErrorKind::Internal,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind() == AuthErrorKind::Unauthorized
    }
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: UserSummary,
    pub tokens: AuthTokens,
    pub remember_me: bool,
}

#[derive(Debug, Clone)]
pub struct PasswordChangeInput {
    pub user_id: UserId,
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Verified claims of an access token.
#[derive(Debug, Clone)]
pub struct AccessTokenClaims {
    pub user_id: UserId,
    pub email: String,
    /// Absent only on tokens minted elsewhere; such tokens are rejected
    /// whenever a revocation epoch is in force.
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub jti: String,
}

/// Verified claims of a refresh token.
#[derive(Debug, Clone)]
pub struct RefreshTokenClaims {
    pub user_id: UserId,
    pub record_id: RefreshRecordId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn issue_access_token(
        &self,
        user: UserId,
        email: &str,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;
    /// Deterministic: the same arguments always produce the same token.
    async fn issue_refresh_token(
        &self,
        user: UserId,
        record_id: RefreshRecordId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AuthError>;
    async fn verify_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<AccessTokenClaims, AuthError>;
    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<RefreshTokenClaims, AuthError>;
    /// Reads `exp` without checking the signature. Only for sizing TTLs.
    fn peek_expiry(&self, token: &str) -> Option<DateTime<Utc>>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn signup(&self, request: SignupInput) -> Result<UserSummary, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    async fn logout(&self, access_token: &str, refresh_token: Option<&str>)
    -> Result<(), AuthError>;
    async fn update_password(&self, request: PasswordChangeInput) -> Result<(), AuthError>;
    async fn profile(&self, user_id: UserId) -> Result<UserSummary, AuthError>;
}
