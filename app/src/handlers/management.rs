//! Management routes (MANAGER role, enforced by the access policy).

use actix_web::{get, HttpResponse, Responder};

use registration_security_core::http::security::AuthenticatedUser;

#[get("/management")]
pub async fn management(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().body(format!(
        "Management\n\nManager: {}",
        user.get_email()
    ))
}
