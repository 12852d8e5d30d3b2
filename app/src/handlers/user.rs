//! Account routes.

use actix_web::{get, HttpResponse, Responder};

use registration_security_core::http::security::AuthenticatedUser;

/// Requires CHANGE_PASSWORD_PRIVILEGE.
#[get("/user/updatePassword")]
pub async fn update_password(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().body(format!("Update password for {}", user.get_email()))
}
