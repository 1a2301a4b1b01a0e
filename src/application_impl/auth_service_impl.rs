use super::{DeferredRevoker, RefreshTokenLedger, RevocationRegistry, bounded};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{Clock, IdentityRepo};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Tunables of the token lifecycle.
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    pub refresh_ttl: Duration,
    pub remember_me_ttl: Duration,
    /// How long a rotated-out refresh token keeps yielding its replacement.
    pub rotation_grace: Duration,
    /// Epoch window raised when a revoked refresh token is replayed.
    pub reuse_epoch_window: Duration,
    /// Epoch window raised on password change; must cover the access TTL.
    pub password_change_epoch_window: Duration,
    pub min_password_len: usize,
    pub call_timeout: Duration,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        LifecyclePolicy {
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            remember_me_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            rotation_grace: Duration::from_secs(10),
            reuse_epoch_window: Duration::from_secs(5),
            password_change_epoch_window: Duration::from_secs(60 * 60),
            min_password_len: 8,
            call_timeout: Duration::from_secs(2),
        }
    }
}

/// The token lifecycle engine: login, refresh with rotation and grace
/// replay, reuse detection, logout and password-change mass revocation.
pub struct RealAuthService {
    identity_repo: Arc<dyn IdentityRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    ledger: Arc<RefreshTokenLedger>,
    revocations: Arc<RevocationRegistry>,
    deferred: Arc<DeferredRevoker>,
    clock: Arc<dyn Clock>,
    policy: LifecyclePolicy,
}

impl RealAuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity_repo: Arc<dyn IdentityRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        ledger: Arc<RefreshTokenLedger>,
        revocations: Arc<RevocationRegistry>,
        deferred: Arc<DeferredRevoker>,
        clock: Arc<dyn Clock>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            identity_repo,
            credential_hasher,
            token_codec,
            ledger,
            revocations,
            deferred,
            clock,
            policy,
        }
    }

    fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    fn validate_signup(&self, email: &str, password: &str) -> Result<(), AuthError> {
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(AuthError::InvalidInput("email is malformed".to_string())),
        }
        self.validate_password(password)
    }

    fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.policy.min_password_len {
            return Err(AuthError::InvalidInput("password too short".to_string()));
        }
        Ok(())
    }

    /// JWT timestamps have second resolution; records are stored the same way
    /// so the refresh token can be re-signed byte for byte.
    fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
        DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
    }

    fn lifetime(ttl: Duration) -> Result<chrono::Duration, AuthError> {
        chrono::Duration::from_std(ttl).map_err(|e| AuthError::InternalError(e.to_string()))
    }

    async fn identity_by_id(&self, user_id: UserId) -> Result<Option<Identity>, AuthError> {
        bounded(
            self.policy.call_timeout,
            "identity.find_by_id",
            self.identity_repo.find_by_id(user_id),
        )
        .await
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        bounded(
            self.policy.call_timeout,
            "credential.hash",
            self.credential_hasher.hash_password(password),
        )
        .await
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        bounded(
            self.policy.call_timeout,
            "credential.verify",
            self.credential_hasher.verify_password(password, hash),
        )
        .await
    }

    /// Picks the record id before signing so the token links to its record.
    async fn mint_refresh(
        &self,
        owner: UserId,
        lifetime: chrono::Duration,
    ) -> Result<(RefreshTokenRecord, RefreshToken), AuthError> {
        let id = RefreshRecordId::new();
        let issued_at = Self::whole_seconds(self.clock.now());
        let expires_at = issued_at + lifetime;
        let token = self
            .token_codec
            .issue_refresh_token(owner, id, issued_at, expires_at)
            .await?;
        let record = self
            .ledger
            .create_record(id, owner, &token, issued_at, expires_at)
            .await?;
        Ok((record, token))
    }

    async fn pair(
        &self,
        identity: &Identity,
        refresh_token: RefreshToken,
        refresh_expires_at: DateTime<Utc>,
    ) -> Result<AuthTokens, AuthError> {
        let (access_token, access_exp) = self
            .token_codec
            .issue_access_token(identity.id, &identity.email)
            .await?;
        Ok(AuthTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_expires_at,
        })
    }

    async fn handle_reuse(&self, record: &RefreshTokenRecord) -> AuthError {
        let user_id = record.owner;
        tracing::warn!(%user_id, record_id = %record.id, "refresh token reuse detected, revoking all sessions");

        match self.ledger.revoke_all_for_user(user_id).await {
            Ok(count) => tracing::info!(%user_id, revoked = count, "refresh chain revoked"),
            Err(e) => tracing::error!(%user_id, error = %e, "revoking refresh records after reuse failed"),
        }
        if let Err(e) = self
            .revocations
            .set_user_revocation_epoch(user_id, self.policy.reuse_epoch_window)
            .await
        {
            tracing::error!(%user_id, error = %e, "raising revocation epoch after reuse failed");
        }

        AuthError::ReuseDetected
    }

    /// Hands back the replacement already issued for `record`, re-signed from
    /// its ledger row, with a fresh access token.
    async fn serve_grace(
        &self,
        record: &RefreshTokenRecord,
        identity: &Identity,
    ) -> Result<AuthTokens, AuthError> {
        let (Some(next_id), Some(expected)) =
            (record.replaced_by, record.grace_period_token_hash.as_ref())
        else {
            return Err(AuthError::InternalError(
                "grace period without a replacement".to_string(),
            ));
        };

        let next = self
            .ledger
            .find_by_id(next_id)
            .await?
            .ok_or(AuthError::TokenRevoked)?;
        let now = self.clock.now();
        if next.state(now) == RecordState::Revoked || next.is_expired(now) {
            return Err(AuthError::TokenRevoked);
        }

        let token = self
            .token_codec
            .issue_refresh_token(next.owner, next.id, next.issued_at, next.expires_at)
            .await?;
        if TokenDigest::of(&token.0) != *expected {
            tracing::error!(record_id = %record.id, "replacement token does not match grace digest");
            return Err(AuthError::InternalError("grace token mismatch".to_string()));
        }

        tracing::debug!(user_id = %record.owner, record_id = %record.id, "served grace replay");
        self.pair(identity, token, next.expires_at).await
    }

    /// Revokes the presented record and, if it was already rotated out, the
    /// replacement it handed over.
    async fn retire_session(&self, record_id: RefreshRecordId) {
        let replaced_by = match self.ledger.revoke(record_id, None).await {
            Ok(record) => record.and_then(|r| r.replaced_by),
            Err(e) => {
                tracing::warn!(%record_id, error = %e, "logout: refresh revocation failed");
                return;
            }
        };
        if let Some(next_id) = replaced_by {
            if let Err(e) = self.ledger.revoke(next_id, None).await {
                tracing::warn!(record_id = %next_id, error = %e, "logout: replacement revocation failed");
            }
        }
    }

    async fn rotate(
        &self,
        record: &RefreshTokenRecord,
        identity: &Identity,
    ) -> Result<AuthTokens, AuthError> {
        let (next, next_token) = self.mint_refresh(record.owner, record.lifetime()).await?;

        let attached = self
            .ledger
            .set_grace_period(record.id, next.id, &next_token, self.policy.rotation_grace)
            .await?;

        match attached {
            Some(_) => {
                self.deferred
                    .schedule(record.id, next.id, self.policy.rotation_grace);
                tracing::info!(
                    user_id = %record.owner,
                    record_id = %record.id,
                    next_record_id = %next.id,
                    "refresh token rotated"
                );
                self.pair(identity, next_token, next.expires_at).await
            }
            None => {
                // a concurrent rotation won; retire ours and follow theirs
                if let Err(e) = self.ledger.revoke(next.id, None).await {
                    tracing::warn!(record_id = %next.id, error = %e, "retiring losing rotation failed");
                }
                let current = self
                    .ledger
                    .find_by_id(record.id)
                    .await?
                    .ok_or(AuthError::TokenInvalid)?;
                match current.state(self.clock.now()) {
                    RecordState::GracePeriod => self.serve_grace(&current, identity).await,
                    _ => Err(AuthError::TokenRevoked),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn signup(&self, request: SignupInput) -> Result<UserSummary, AuthError> {
        let SignupInput {
            email,
            password,
            name,
        } = request;
        let email = Self::normalize_email(&email);

        self.validate_signup(&email, &password)?;

        let existing = bounded(
            self.policy.call_timeout,
            "identity.find_by_email",
            self.identity_repo.find_by_email(&email),
        )
        .await?;
        if existing.is_some() {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.hash_password(&password).await?;
        let identity = Identity {
            id: UserId::new(),
            email,
            password_hash,
            name: name.trim().to_string(),
            created_at: self.clock.now(),
        };
        bounded(
            self.policy.call_timeout,
            "identity.create",
            self.identity_repo.create(&identity),
        )
        .await?;

        tracing::info!(user_id = %identity.id, "user registered");
        Ok(UserSummary::from(&identity))
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput {
            email,
            password,
            remember_me,
        } = request;
        let email = Self::normalize_email(&email);

        let found = bounded(
            self.policy.call_timeout,
            "identity.find_by_email",
            self.identity_repo.find_by_email(&email),
        )
        .await?;

        let Some(identity) = found else {
            // keep the unknown-email path as slow as a wrong password
            let _ = self.hash_password(&password).await;
            tracing::info!("login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(&password, &identity.password_hash).await? {
            tracing::info!(user_id = %identity.id, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let ttl = if remember_me {
            self.policy.remember_me_ttl
        } else {
            self.policy.refresh_ttl
        };
        let (record, refresh_token) = self.mint_refresh(identity.id, Self::lifetime(ttl)?).await?;
        let tokens = self.pair(&identity, refresh_token, record.expires_at).await?;

        tracing::info!(user_id = %identity.id, record_id = %record.id, remember_me, "login succeeded");
        Ok(LoginResult {
            user: UserSummary::from(&identity),
            tokens,
            remember_me,
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let claims = self
            .token_codec
            .verify_refresh_token(&RefreshToken(refresh_token.to_string()))
            .await
            .inspect_err(|e| tracing::debug!(error = %e, "refresh token failed verification"))?;

        let record = self
            .ledger
            .find_by_raw_token(refresh_token)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        if record.id != claims.record_id || record.owner != claims.user_id {
            return Err(AuthError::TokenInvalid);
        }

        let now = self.clock.now();
        let state = record.state(now);
        if state == RecordState::Revoked {
            return Err(self.handle_reuse(&record).await);
        }
        if record.is_expired(now) {
            return Err(AuthError::TokenExpired);
        }

        let identity = self
            .identity_by_id(record.owner)
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        match state {
            RecordState::GracePeriod => self.serve_grace(&record, &identity).await,
            _ => self.rotate(&record, &identity).await,
        }
    }

    async fn logout(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let caller = self
            .token_codec
            .verify_access_token(&AccessToken(access_token.to_string()))
            .await
            .ok()
            .map(|claims| claims.user_id);
        self.revocations.blacklist_token(access_token).await?;

        if let Some(raw) = refresh_token {
            match self
                .token_codec
                .verify_refresh_token(&RefreshToken(raw.to_string()))
                .await
            {
                Ok(claims) if Some(claims.user_id) != caller => {
                    tracing::warn!(record_id = %claims.record_id, "logout: refresh token belongs to another user, ignored");
                }
                Ok(claims) => self.retire_session(claims.record_id).await,
                Err(e) => tracing::debug!(error = %e, "logout: refresh token ignored"),
            }
        }

        tracing::info!("logged out");
        Ok(())
    }

    async fn update_password(&self, request: PasswordChangeInput) -> Result<(), AuthError> {
        let PasswordChangeInput {
            user_id,
            current_password,
            new_password,
        } = request;

        let identity = self
            .identity_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .verify_password(&current_password, &identity.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }
        self.validate_password(&new_password)?;

        let password_hash = self.hash_password(&new_password).await?;
        let updated = bounded(
            self.policy.call_timeout,
            "identity.update_password",
            self.identity_repo.update_password_hash(user_id, &password_hash),
        )
        .await?;
        if !updated {
            return Err(AuthError::UserNotFound);
        }

        let revoked = self.ledger.revoke_all_for_user(user_id).await?;
        self.revocations
            .set_user_revocation_epoch(user_id, self.policy.password_change_epoch_window)
            .await?;

        tracing::info!(%user_id, revoked, "password changed, all sessions revoked");
        Ok(())
    }

    async fn profile(&self, user_id: UserId) -> Result<UserSummary, AuthError> {
        let identity = self
            .identity_by_id(user_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        Ok(UserSummary::from(&identity))
    }
}
