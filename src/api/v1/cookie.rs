use super::CsrfSigner;
use crate::application_port::{AuthError, AuthTokens};
use crate::domain_port::Clock;
use chrono::{DateTime, Utc};
use cookie::{Cookie, SameSite};
use std::sync::Arc;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    /// Must cover both `/auth/refresh` and `/auth/logout`.
    pub refresh_path: String,
}

impl CookiePolicy {
    fn render(
        &self,
        name: &'static str,
        value: &str,
        path: &str,
        max_age: i64,
        http_only: bool,
    ) -> String {
        Cookie::build((name, value.to_owned()))
            .http_only(http_only)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .path(path.to_owned())
            .max_age(time::Duration::seconds(max_age))
            .build()
            .encoded()
            .to_string()
    }
}

fn seconds_until(at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (at - now).num_seconds().max(0)
}

/// Builds the `Set-Cookie` values that carry a session to the browser.
pub struct SessionCookies {
    policy: CookiePolicy,
    csrf: Arc<CsrfSigner>,
    clock: Arc<dyn Clock>,
}

impl SessionCookies {
    pub fn new(policy: CookiePolicy, csrf: Arc<CsrfSigner>, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            csrf,
            clock,
        }
    }

    /// Access, refresh and a fresh CSRF cookie for `tokens`.
    pub fn issue(&self, tokens: &AuthTokens) -> Result<Vec<String>, AuthError> {
        let now = self.clock.now();
        let refresh_max_age = seconds_until(tokens.refresh_token_expires_at, now);
        let csrf_token = self.csrf.issue()?;

        Ok(vec![
            self.policy.render(
                ACCESS_COOKIE,
                &tokens.access_token.0,
                "/",
                seconds_until(tokens.access_token_expires_at, now),
                true,
            ),
            self.policy.render(
                REFRESH_COOKIE,
                &tokens.refresh_token.0,
                &self.policy.refresh_path,
                refresh_max_age,
                true,
            ),
            self.policy
                .render(CSRF_COOKIE, &csrf_token, "/", refresh_max_age, false),
        ])
    }

    pub fn cleared(&self) -> Vec<String> {
        vec![
            self.policy.render(ACCESS_COOKIE, "", "/", 0, true),
            self.policy
                .render(REFRESH_COOKIE, "", &self.policy.refresh_path, 0, true),
            self.policy.render(CSRF_COOKIE, "", "/", 0, false),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_port::{AccessToken, RefreshToken};
    use crate::infra_memory::ManualClock;
    use chrono::TimeZone;

    fn cookies(secure: bool) -> (SessionCookies, Arc<CsrfSigner>, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let csrf = Arc::new(CsrfSigner::new(b"k".to_vec()));
        let policy = CookiePolicy {
            secure,
            refresh_path: "/api/v1/auth".to_string(),
        };
        (
            SessionCookies::new(policy, csrf.clone(), Arc::new(ManualClock::new(now))),
            csrf,
            now,
        )
    }

    fn parsed(raw: &str) -> Cookie<'static> {
        Cookie::parse_encoded(raw.to_owned()).unwrap()
    }

    #[test]
    fn session_cookies_carry_scoped_paths_and_lifetimes() {
        let (cookies, csrf, now) = cookies(true);
        let tokens = AuthTokens {
            access_token: AccessToken("acc".into()),
            refresh_token: RefreshToken("ref".into()),
            access_token_expires_at: now + chrono::Duration::minutes(15),
            refresh_token_expires_at: now + chrono::Duration::days(7),
        };

        let set = cookies.issue(&tokens).unwrap();
        let access = parsed(&set[0]);
        assert_eq!((access.name(), access.value()), ("access_token", "acc"));
        assert_eq!(access.path(), Some("/"));
        assert_eq!(access.max_age(), Some(time::Duration::seconds(900)));
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Strict));

        let refresh = parsed(&set[1]);
        assert_eq!((refresh.name(), refresh.value()), ("refresh_token", "ref"));
        assert_eq!(refresh.path(), Some("/api/v1/auth"));
        assert_eq!(refresh.max_age(), Some(time::Duration::days(7)));
        assert_eq!(refresh.http_only(), Some(true));

        let token = parsed(&set[2]);
        assert_eq!(token.name(), "csrf_token");
        assert_ne!(token.http_only(), Some(true));
        assert_eq!(token.max_age(), Some(time::Duration::days(7)));
        assert!(csrf.verify(token.value()));
    }

    #[test]
    fn cleared_cookies_expire_immediately() {
        let (cookies, _, _) = cookies(false);
        let cleared: Vec<_> = cookies.cleared().iter().map(|c| parsed(c)).collect();
        assert_eq!(cleared.len(), 3);
        assert!(cleared.iter().all(|c| c.max_age() == Some(time::Duration::ZERO)));
        assert!(cleared.iter().all(|c| c.value().is_empty()));
        assert!(cleared.iter().all(|c| c.secure() != Some(true)));
        assert_eq!(cleared[1].path(), Some("/api/v1/auth"));
    }

    #[test]
    fn values_outside_the_cookie_alphabet_are_encoded() {
        let policy = CookiePolicy {
            secure: false,
            refresh_path: "/api/v1/auth".to_string(),
        };
        let raw = policy.render(ACCESS_COOKIE, "a; Path=/evil", "/", 60, true);
        assert!(!raw.contains("; Path=/evil"));
        assert_eq!(parsed(&raw).value(), "a; Path=/evil");
    }
}
