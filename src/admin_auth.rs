//! Bearer-token guard for the admin surface (base spec §6: "Requires
//! bearer-token auth (constant-time compare)"). Grounded on
//! `auth::guards::RequireAdmin`'s request-guard shape, simplified from a
//! JWT/role lookup to a single shared-secret comparison against
//! `ADMIN_API_KEY`.

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State};
use subtle::ConstantTimeEq;

use crate::config::TrackerConfig;

#[derive(Debug, Clone, Copy)]
pub struct AdminAuthError;

pub struct AdminUser;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = AdminAuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = request.guard::<&State<TrackerConfig>>().await.succeeded() else {
            return Outcome::Failure((Status::InternalServerError, AdminAuthError));
        };

        let Some(expected) = &config.admin_api_key else {
            return Outcome::Failure((Status::ServiceUnavailable, AdminAuthError));
        };

        let Some(token) = bearer_token(request) else {
            return Outcome::Failure((Status::Unauthorized, AdminAuthError));
        };

        if constant_time_eq(token, expected) {
            Outcome::Success(AdminUser)
        } else {
            Outcome::Failure((Status::Unauthorized, AdminAuthError))
        }
    }
}

fn bearer_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    let header = request.headers().get_one("Authorization")?;
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next()?;
    let token = parts.next()?;
    (scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty()).then_some(token)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}
