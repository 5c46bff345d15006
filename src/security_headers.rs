//! Security headers fairing (base spec §6), response-phase only, sitting
//! alongside `RequestLogger` as its own single-concern fairing.

use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Request, Response};

pub struct SecurityHeaders;

#[rocket::async_trait]
impl Fairing for SecurityHeaders {
    fn info(&self) -> Info {
        Info {
            name: "Security Headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_raw_header("X-Content-Type-Options", "nosniff");
        response.set_raw_header("X-Frame-Options", "DENY");
        response.set_raw_header("X-XSS-Protection", "1; mode=block");
        response.set_raw_header("Referrer-Policy", "strict-origin-when-cross-origin");
        response.set_raw_header(
            "Content-Security-Policy",
            "default-src 'self'; frame-ancestors 'none'",
        );
    }
}
