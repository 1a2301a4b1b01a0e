use super::RevocationRegistry;
use crate::application_port::*;
use std::sync::Arc;

/// Per-request admission: signature and expiry, then the blacklist, then the
/// owner's revocation epoch. Any failure to consult the revocation store
/// denies the request.
pub struct RealAccessGuard {
    token_codec: Arc<dyn TokenCodec>,
    revocations: Arc<RevocationRegistry>,
}

impl RealAccessGuard {
    pub fn new(token_codec: Arc<dyn TokenCodec>, revocations: Arc<RevocationRegistry>) -> Self {
        Self {
            token_codec,
            revocations,
        }
    }

    fn deny_unverifiable(e: AuthError) -> AuthError {
        tracing::warn!(error = %e, "revocation state unavailable, denying access");
        e
    }
}

#[async_trait::async_trait]
impl AccessGuard for RealAccessGuard {
    async fn admit(&self, access_token: &str) -> Result<AuthContext, AuthError> {
        let claims = self
            .token_codec
            .verify_access_token(&AccessToken(access_token.to_string()))
            .await?;

        if self
            .revocations
            .is_blacklisted(access_token)
            .await
            .map_err(Self::deny_unverifiable)?
        {
            return Err(AuthError::TokenRevoked);
        }

        let epoch = self
            .revocations
            .get_user_revocation_epoch(claims.user_id)
            .await
            .map_err(Self::deny_unverifiable)?;
        if let Some(epoch) = epoch {
            match claims.issued_at {
                Some(issued_at) if issued_at >= epoch => {}
                _ => return Err(AuthError::TokenRevoked),
            }
        }

        Ok(AuthContext {
            user_id: claims.user_id,
            email: claims.email,
            expires_at: claims.expires_at,
        })
    }
}
