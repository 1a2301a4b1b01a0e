use crate::api::v1::{CookiePolicy, CsrfSigner, SessionCookies};
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::LedgerSweeper;
use crate::settings::{self, Settings};
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SWEEP_BATCH: u32 = 500;
const DEFERRED_DRAIN_LIMIT: Duration = Duration::from_secs(15);

struct Backends {
    identity_repo: Arc<dyn IdentityRepo>,
    refresh_token_repo: Arc<dyn RefreshTokenRepo>,
    revocation_store: Arc<dyn RevocationStore>,
    memory_revocations: Option<Arc<MemoryRevocationStore>>,
    pool: Option<Pool<MySql>>,
}

impl Backends {
    fn memory(clock: Arc<dyn Clock>) -> Self {
        let revocations = Arc::new(MemoryRevocationStore::new(clock));
        Backends {
            identity_repo: Arc::new(MemoryIdentityRepo::new()),
            refresh_token_repo: Arc::new(MemoryRefreshTokenRepo::new()),
            revocation_store: revocations.clone(),
            memory_revocations: Some(revocations),
            pool: None,
        }
    }

    async fn real(storage: &settings::Storage) -> anyhow::Result<Self> {
        let redis_client = redis::Client::open(storage.redis_dsn.as_str())?;
        let redis_manager = redis_client.get_connection_manager().await?;
        let pool = Pool::<MySql>::connect(&storage.mysql_dsn).await?;

        Ok(Backends {
            identity_repo: Arc::new(MySqlIdentityRepo::new(pool.clone())),
            refresh_token_repo: Arc::new(MySqlRefreshTokenRepo::new(pool.clone())),
            revocation_store: Arc::new(RedisRevocationStore::new(
                redis_manager,
                storage.redis_prefix.clone(),
            )),
            memory_revocations: None,
            pool: Some(pool),
        })
    }
}

/// The development fallback is only handed out when `allow_dev` is set;
/// otherwise a missing secret is a startup error.
fn resolve_secret(var: &str, value: Option<String>, allow_dev: bool) -> anyhow::Result<Vec<u8>> {
    match value {
        Some(secret) if !secret.is_empty() => Ok(secret.into_bytes()),
        _ if allow_dev => {
            warn!(env = var, "secret not set, using an insecure development value");
            Ok(format!("tokengate-dev-{}", var.to_lowercase()).into_bytes())
        }
        _ => anyhow::bail!("secret {var} is not set"),
    }
}

fn secret_from_env(var: &str, allow_dev: bool) -> anyhow::Result<Vec<u8>> {
    resolve_secret(var, std::env::var(var).ok(), allow_dev)
}

pub fn policy_from_settings(auth: &settings::Auth, storage: &settings::Storage) -> LifecyclePolicy {
    LifecyclePolicy {
        refresh_ttl: Duration::from_secs(auth.refresh_ttl_secs),
        remember_me_ttl: Duration::from_secs(auth.remember_me_ttl_secs),
        rotation_grace: Duration::from_secs(auth.rotation_grace_secs),
        reuse_epoch_window: Duration::from_secs(auth.reuse_epoch_secs),
        password_change_epoch_window: Duration::from_secs(auth.password_change_epoch_secs),
        min_password_len: auth.min_password_len,
        call_timeout: Duration::from_millis(storage.call_timeout_ms),
    }
}

/// Everything [`Server::assemble`] needs besides the storage backends.
pub struct ServerConfig {
    pub jwt: JwtConfig,
    pub policy: LifecyclePolicy,
    pub csrf_key: Vec<u8>,
    pub cookies: CookiePolicy,
    pub sweep_interval: Option<Duration>,
}

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub access_guard: Arc<dyn AccessGuard>,
    pub csrf: Arc<CsrfSigner>,
    pub session_cookies: Arc<SessionCookies>,
    deferred: Arc<DeferredRevoker>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());

        let auth = &settings.auth;
        let allow_dev_secrets = settings.storage.backend == "memory" && cfg!(debug_assertions);
        let access_signing_key = secret_from_env(&auth.access_secret_env, allow_dev_secrets)?;
        let refresh_signing_key = secret_from_env(&auth.refresh_secret_env, allow_dev_secrets)?;
        let csrf_key = secret_from_env(&auth.csrf_secret_env, allow_dev_secrets)?;

        let backends = match settings.storage.backend.as_str() {
            "memory" => Backends::memory(clock.clone()),
            "real" => Backends::real(&settings.storage).await?,
            other => return Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        };

        let jwt = JwtConfig {
            issuer: auth.issuer.clone(),
            access_audience: auth.access_audience.clone(),
            refresh_audience: auth.refresh_audience.clone(),
            access_ttl: Duration::from_secs(auth.access_ttl_secs),
            access_signing_key,
            refresh_signing_key,
        };
        if jwt.access_signing_key == jwt.refresh_signing_key {
            return Err(anyhow::anyhow!(
                "access and refresh tokens must be signed with different secrets"
            ));
        }
        if Duration::from_secs(auth.password_change_epoch_secs) < jwt.access_ttl {
            warn!("password change epoch window is shorter than the access token lifetime");
        }

        let password = &settings.password;
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(
            Argon2PasswordHasher::from_costs(
                password.memory_kib,
                password.iterations,
                password.parallelism,
            )
            .map_err(|e| anyhow::anyhow!(e))?,
        );

        let config = ServerConfig {
            jwt,
            policy: policy_from_settings(auth, &settings.storage),
            csrf_key,
            cookies: CookiePolicy {
                secure: settings.cookie.secure,
                refresh_path: settings.cookie.refresh_path.clone(),
            },
            sweep_interval: Some(Duration::from_secs(settings.storage.sweep_interval_secs.max(1))),
        };

        let server = Self::assemble(clock, backends, credential_hasher, config);
        info!(backend = %settings.storage.backend, "server started");
        Ok(server)
    }

    /// A server over in-process stores, driven by `clock`.
    pub fn in_memory(
        clock: Arc<dyn Clock>,
        credential_hasher: Arc<dyn CredentialHasher>,
        config: ServerConfig,
    ) -> Self {
        Self::assemble(clock.clone(), Backends::memory(clock), credential_hasher, config)
    }

    fn assemble(
        clock: Arc<dyn Clock>,
        backends: Backends,
        credential_hasher: Arc<dyn CredentialHasher>,
        config: ServerConfig,
    ) -> Self {
        let ServerConfig {
            jwt,
            policy,
            csrf_key,
            cookies,
            sweep_interval,
        } = config;

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(jwt, clock.clone()));
        let ledger = Arc::new(RefreshTokenLedger::new(
            backends.refresh_token_repo,
            clock.clone(),
            policy.call_timeout,
        ));
        let revocations = Arc::new(RevocationRegistry::new(
            backends.revocation_store,
            token_codec.clone(),
            clock.clone(),
            policy.call_timeout,
        ));
        let deferred = Arc::new(DeferredRevoker::new(ledger.clone()));

        let access_guard: Arc<dyn AccessGuard> =
            Arc::new(RealAccessGuard::new(token_codec.clone(), revocations.clone()));
        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            backends.identity_repo,
            credential_hasher,
            token_codec,
            ledger.clone(),
            revocations,
            deferred.clone(),
            clock.clone(),
            policy,
        ));

        let cancel = CancellationToken::new();
        let sweeper_handle = sweep_interval.map(|interval| {
            let sweeper = LedgerSweeper::new(
                ledger,
                backends.memory_revocations,
                interval,
                SWEEP_BATCH,
                cancel.clone(),
            );
            tokio::spawn(async move { sweeper.run().await })
        });

        let csrf = Arc::new(CsrfSigner::new(csrf_key));
        let session_cookies = Arc::new(SessionCookies::new(cookies, csrf.clone(), clock));

        Self {
            auth_service,
            access_guard,
            csrf,
            session_cookies,
            deferred,
            sweeper_handle: Mutex::new(sweeper_handle),
            cancel,
            pool: backends.pool,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self.sweeper_handle.lock().ok().and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        let pending = self.deferred.pending();
        if !self.deferred.drain(DEFERRED_DRAIN_LIMIT).await {
            warn!(pending, "deferred revocations still pending at shutdown");
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
