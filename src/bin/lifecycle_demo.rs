//! Walks one account through the token lifecycle against the in-memory
//! stores, with a hand-driven clock.
//!
//! $ cargo run --bin lifecycle_demo

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokengate::application_impl::*;
use tokengate::application_port::*;
use tokengate::domain_port::Clock;
use tokengate::infra_memory::*;
use tokengate::logger::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _logger = Logger::new_bootstrap();

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let policy = LifecyclePolicy::default();
    let codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(
        JwtConfig {
            issuer: "tokengate".to_string(),
            access_audience: "tokengate.access".to_string(),
            refresh_audience: "tokengate.refresh".to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            access_signing_key: b"demo-access-secret".to_vec(),
            refresh_signing_key: b"demo-refresh-secret".to_vec(),
        },
        clock.clone(),
    ));
    let ledger = Arc::new(RefreshTokenLedger::new(
        Arc::new(MemoryRefreshTokenRepo::new()),
        clock.clone(),
        policy.call_timeout,
    ));
    let revocations = Arc::new(RevocationRegistry::new(
        Arc::new(MemoryRevocationStore::new(clock.clone())),
        codec.clone(),
        clock.clone(),
        policy.call_timeout,
    ));
    let deferred = Arc::new(DeferredRevoker::new(ledger.clone()));
    let guard = RealAccessGuard::new(codec.clone(), revocations.clone());
    let service = RealAuthService::new(
        Arc::new(MemoryIdentityRepo::new()),
        Arc::new(Argon2PasswordHasher::from_costs(4096, 1, 1)?),
        codec,
        ledger,
        revocations,
        deferred.clone(),
        clock.clone(),
        policy,
    );

    let user = service
        .signup(SignupInput {
            email: "demo@example.com".to_string(),
            password: "correct horse".to_string(),
            name: "Demo".to_string(),
        })
        .await?;
    info!(user_id = %user.id, "signed up");

    let session = service
        .login(LoginInput {
            email: "demo@example.com".to_string(),
            password: "correct horse".to_string(),
            remember_me: false,
        })
        .await?;
    let ctx = guard.admit(&session.tokens.access_token.0).await?;
    info!(user_id = %ctx.user_id, "access token admitted");

    let first_refresh = session.tokens.refresh_token.0.clone();
    let rotated = service.refresh_token(&first_refresh).await?;
    let replay = service.refresh_token(&first_refresh).await?;
    info!(
        same_token = rotated.refresh_token == replay.refresh_token,
        "replay inside the grace window"
    );

    clock.advance(chrono::Duration::seconds(11));
    match service.refresh_token(&first_refresh).await {
        Err(e) => warn!(error = %e, "replay after the grace window"),
        Ok(_) => error!("stale refresh token was accepted"),
    }
    match guard.admit(&rotated.access_token.0).await {
        Err(e) => info!(error = %e, "access tokens issued before the reuse are rejected"),
        Ok(_) => error!("access token survived reuse detection"),
    }

    deferred.drain(Duration::from_secs(1)).await;
    Ok(())
}
