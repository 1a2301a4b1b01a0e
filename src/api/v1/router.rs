use super::cookie::*;
use super::csrf::CsrfSigner;
use super::error::*;
use super::handler::{self, Authenticated};
use crate::application_port::AccessGuard;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let signup = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::signup);

    let login = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with(server.session_cookies.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(with_csrf(server.csrf.clone()))
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.auth_service.clone()))
        .and(with(server.session_cookies.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(with_auth(server.access_guard.clone()))
        .and(with_csrf(server.csrf.clone()))
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.auth_service.clone()))
        .and(with(server.session_cookies.clone()))
        .and_then(handler::logout);

    let change_password = warp::put()
        .and(warp::path("auth"))
        .and(warp::path("password"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_auth(server.access_guard.clone()))
        .and(with_csrf(server.csrf.clone()))
        .and(with(server.auth_service.clone()))
        .and(with(server.session_cookies.clone()))
        .and_then(handler::change_password);

    let me = warp::get()
        .and(warp::path("auth"))
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_auth(server.access_guard.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::me);

    signup
        .or(login)
        .or(refresh)
        .or(logout)
        .or(change_password)
        .or(me)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// The `access_token` cookie, or failing that an `Authorization: Bearer`
/// header, admitted through the access guard.
fn with_auth(
    access_guard: Arc<dyn AccessGuard>,
) -> impl Filter<Extract = (Authenticated,), Error = warp::Rejection> + Clone {
    warp::cookie::optional::<String>(ACCESS_COOKIE)
        .and(warp::header::optional::<String>("authorization"))
        .and_then(move |cookie: Option<String>, header: Option<String>| {
            let access_guard = access_guard.clone();
            async move {
                let bearer = header.and_then(|h| h.strip_prefix("Bearer ").map(str::to_string));
                let Some(token) = cookie.filter(|c| !c.is_empty()).or(bearer) else {
                    return Err(reject::custom(ApiErrorCode::Unauthorized));
                };
                let context = access_guard
                    .admit(&token)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok(Authenticated {
                    context,
                    access_token: token,
                })
            }
        })
}

fn with_csrf(
    csrf: Arc<CsrfSigner>,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::cookie::optional::<String>(CSRF_COOKIE)
        .and(warp::header::optional::<String>(CSRF_HEADER))
        .and_then(move |cookie: Option<String>, header: Option<String>| {
            let csrf = csrf.clone();
            async move {
                if csrf.check_double_submit(cookie.as_deref(), header.as_deref()) {
                    Ok(())
                } else {
                    Err(reject::custom(ApiErrorCode::CsrfRejected))
                }
            }
        })
        .untuple_one()
}
