use crate::application_port::{
    AccessToken, AccessTokenClaims, AuthError, RefreshToken, RefreshTokenClaims, TokenCodec,
};
use crate::domain_model::{RefreshRecordId, UserId};
use crate::domain_port::Clock;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Access and refresh tokens are signed with different secrets and scoped to
/// different audiences, so neither kind verifies as the other.
#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub access_audience: String,
    pub refresh_audience: String,
    pub access_ttl: Duration,
    pub access_signing_key: Vec<u8>,
    pub refresh_signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    email: String,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    // issuance in microseconds; orders tokens against revocation epochs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat_us: Option<i64>,
    iss: String,
    aud: String,
    jti: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    sub: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String, // ledger record id
}

#[derive(Debug, Deserialize)]
struct ExpiryOnly {
    exp: i64,
}

fn sign<T: Serialize>(claims: &T, key: &[u8]) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(key),
    )
    .map_err(|e| AuthError::InternalError(e.to_string()))
}

fn validation(issuer: &str, audience: &str) -> Validation {
    let mut v = Validation::new(Algorithm::HS256);
    // expiry is checked against the injected clock after decoding
    v.validate_exp = false;
    v.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
    v.set_audience(&[audience]);
    v.set_issuer(&[issuer]);
    v
}

fn verify<T: serde::de::DeserializeOwned>(
    token: &str,
    key: &[u8],
    v: &Validation,
) -> Result<T, AuthError> {
    let data = decode::<T>(token, &DecodingKey::from_secret(key), v).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid,
    })?;
    Ok(data.claims)
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    DateTime::from_timestamp(secs, 0).ok_or(AuthError::TokenInvalid)
}

/// Falls back to the start of the `iat` second for tokens without `iat_us`.
fn issued_at(claims: &AccessClaims) -> Result<Option<DateTime<Utc>>, AuthError> {
    match (claims.iat_us, claims.iat) {
        (Some(micros), _) => DateTime::from_timestamp_micros(micros)
            .map(Some)
            .ok_or(AuthError::TokenInvalid),
        (None, Some(secs)) => timestamp(secs).map(Some),
        (None, None) => Ok(None),
    }
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    clock: Arc<dyn Clock>,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig, clock: Arc<dyn Clock>) -> Self {
        JwtHs256Codec { cfg, clock }
    }

    #[inline]
    fn new_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[inline]
    fn parse_user_id(sub: &str) -> Result<UserId, AuthError> {
        sub.parse::<UserId>().map_err(|_| AuthError::TokenInvalid)
    }

    fn check_expiry(&self, exp: i64) -> Result<DateTime<Utc>, AuthError> {
        if exp <= self.clock.now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        timestamp(exp)
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHs256Codec {
    async fn issue_access_token(
        &self,
        user: UserId,
        email: &str,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let iat_dt = self.clock.stamp();
        let exp_dt = iat_dt + self.cfg.access_ttl;
        let claims = AccessClaims {
            sub: user.to_string(),
            email: email.to_owned(),
            exp: exp_dt.timestamp(),
            iat: Some(iat_dt.timestamp()),
            iat_us: Some(iat_dt.timestamp_micros()),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.access_audience.clone(),
            jti: Self::new_jti(),
        };
        let token = sign(&claims, &self.cfg.access_signing_key)?;
        Ok((AccessToken(token), timestamp(claims.exp)?))
    }

    async fn issue_refresh_token(
        &self,
        user: UserId,
        record_id: RefreshRecordId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AuthError> {
        let claims = RefreshClaims {
            sub: user.to_string(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.refresh_audience.clone(),
            jti: record_id.to_string(),
        };
        let token = sign(&claims, &self.cfg.refresh_signing_key)?;
        Ok(RefreshToken(token))
    }

    async fn verify_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<AccessTokenClaims, AuthError> {
        let v = validation(&self.cfg.issuer, &self.cfg.access_audience);
        let claims: AccessClaims = verify(&token.0, &self.cfg.access_signing_key, &v)?;
        let expires_at = self.check_expiry(claims.exp)?;
        let issued_at = issued_at(&claims)?;
        Ok(AccessTokenClaims {
            user_id: Self::parse_user_id(&claims.sub)?,
            email: claims.email,
            issued_at,
            expires_at,
            jti: claims.jti,
        })
    }

    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<RefreshTokenClaims, AuthError> {
        let v = validation(&self.cfg.issuer, &self.cfg.refresh_audience);
        let claims: RefreshClaims = verify(&token.0, &self.cfg.refresh_signing_key, &v)?;
        let expires_at = self.check_expiry(claims.exp)?;
        let record_id = claims
            .jti
            .parse::<RefreshRecordId>()
            .map_err(|_| AuthError::TokenInvalid)?;
        Ok(RefreshTokenClaims {
            user_id: Self::parse_user_id(&claims.sub)?,
            record_id,
            issued_at: timestamp(claims.iat)?,
            expires_at,
        })
    }

    fn peek_expiry(&self, token: &str) -> Option<DateTime<Utc>> {
        let mut v = Validation::new(Algorithm::HS256);
        v.insecure_disable_signature_validation();
        v.validate_exp = false;
        v.validate_aud = false;
        v.required_spec_claims.clear();
        let data = decode::<ExpiryOnly>(token, &DecodingKey::from_secret(&[]), &v).ok()?;
        DateTime::from_timestamp(data.claims.exp, 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infra_memory::ManualClock;
    use chrono::TimeZone;

    pub(crate) fn test_config() -> JwtConfig {
        JwtConfig {
            issuer: "tokengate.test".to_string(),
            access_audience: "tokengate.access".to_string(),
            refresh_audience: "tokengate.refresh".to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            access_signing_key: b"access-secret".to_vec(),
            refresh_signing_key: b"refresh-secret".to_vec(),
        }
    }

    fn codec() -> (JwtHs256Codec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        (JwtHs256Codec::new(test_config(), clock.clone()), clock)
    }

    #[tokio::test]
    async fn access_token_round_trips_identity() {
        let (codec, clock) = codec();
        let user = UserId::new();
        let (token, exp) = codec.issue_access_token(user, "a@x.com").await.unwrap();
        let claims = codec.verify_access_token(&token).await.unwrap();
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.issued_at, Some(clock.now()));
        assert_eq!(claims.expires_at, exp);
        assert_eq!(exp - clock.now(), chrono::Duration::minutes(15));
    }

    #[tokio::test]
    async fn tokens_minted_in_one_tick_carry_ordered_issue_times() {
        let (codec, clock) = codec();
        let user = UserId::new();
        let (first, _) = codec.issue_access_token(user, "a@x.com").await.unwrap();
        let (second, _) = codec.issue_access_token(user, "a@x.com").await.unwrap();
        let first = codec.verify_access_token(&first).await.unwrap().issued_at.unwrap();
        let second = codec.verify_access_token(&second).await.unwrap().issued_at.unwrap();
        assert!(first < second);
        assert_eq!(second - clock.now(), chrono::Duration::microseconds(1));
    }

    #[tokio::test]
    async fn scopes_do_not_cross() {
        let (codec, clock) = codec();
        let user = UserId::new();
        let now = clock.now();
        let refresh = codec
            .issue_refresh_token(user, RefreshRecordId::new(), now, now + chrono::Duration::days(7))
            .await
            .unwrap();
        let (access, _) = codec.issue_access_token(user, "a@x.com").await.unwrap();

        let err = codec
            .verify_access_token(&AccessToken(refresh.0.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
        let err = codec
            .verify_refresh_token(&RefreshToken(access.0.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[tokio::test]
    async fn same_key_different_audience_is_still_rejected() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut cfg = test_config();
        cfg.refresh_signing_key = cfg.access_signing_key.clone();
        let codec = JwtHs256Codec::new(cfg, clock.clone());
        let now = clock.now();
        let refresh = codec
            .issue_refresh_token(UserId::new(), RefreshRecordId::new(), now, now + chrono::Duration::days(1))
            .await
            .unwrap();
        assert!(codec.verify_access_token(&AccessToken(refresh.0)).await.is_err());
    }

    #[tokio::test]
    async fn expired_tokens_fail_even_with_valid_signature() {
        let (codec, clock) = codec();
        let user = UserId::new();
        let (access, _) = codec.issue_access_token(user, "a@x.com").await.unwrap();
        let now = clock.now();
        let refresh = codec
            .issue_refresh_token(user, RefreshRecordId::new(), now, now + chrono::Duration::hours(1))
            .await
            .unwrap();

        clock.advance(chrono::Duration::minutes(15));
        assert!(matches!(
            codec.verify_access_token(&access).await.unwrap_err(),
            AuthError::TokenExpired
        ));
        assert!(codec.verify_refresh_token(&refresh).await.is_ok());

        clock.advance(chrono::Duration::hours(1));
        assert!(matches!(
            codec.verify_refresh_token(&refresh).await.unwrap_err(),
            AuthError::TokenExpired
        ));
    }

    #[tokio::test]
    async fn refresh_tokens_are_deterministic_and_carry_the_record_id() {
        let (codec, clock) = codec();
        let user = UserId::new();
        let record = RefreshRecordId::new();
        let now = clock.now();
        let exp = now + chrono::Duration::days(30);
        let a = codec.issue_refresh_token(user, record, now, exp).await.unwrap();
        let b = codec.issue_refresh_token(user, record, now, exp).await.unwrap();
        assert_eq!(a, b);

        let claims = codec.verify_refresh_token(&a).await.unwrap();
        assert_eq!(claims.record_id, record);
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.expires_at, exp);
    }

    #[tokio::test]
    async fn tampered_tokens_are_invalid() {
        let (codec, _) = codec();
        let (access, _) = codec.issue_access_token(UserId::new(), "a@x.com").await.unwrap();
        let mut raw = access.0.clone();
        raw.push('x');
        assert!(matches!(
            codec.verify_access_token(&AccessToken(raw)).await.unwrap_err(),
            AuthError::TokenInvalid
        ));
        assert!(matches!(
            codec.verify_access_token(&AccessToken("garbage".into())).await.unwrap_err(),
            AuthError::TokenInvalid
        ));
    }

    #[tokio::test]
    async fn peek_reads_expiry_without_a_key() {
        let (codec, _) = codec();
        let (access, exp) = codec.issue_access_token(UserId::new(), "a@x.com").await.unwrap();

        let other = JwtHs256Codec::new(
            JwtConfig {
                access_signing_key: b"unrelated".to_vec(),
                ..test_config()
            },
            Arc::new(ManualClock::new(Utc::now())),
        );
        assert_eq!(other.peek_expiry(&access.0), Some(exp));
        assert_eq!(other.peek_expiry("not.a.jwt"), None);
    }
}
