mod cookie;
mod csrf;
mod error;
mod handler;
mod router;

pub use cookie::{ACCESS_COOKIE, CSRF_COOKIE, CSRF_HEADER, CookiePolicy, REFRESH_COOKIE, SessionCookies};
pub use csrf::CsrfSigner;
pub use error::{ApiErrorCode, recover_error};
pub use router::routes;
