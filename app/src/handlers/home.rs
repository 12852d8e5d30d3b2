//! Pages for any signed-in user (READ_PRIVILEGE, or STAFF for the hierarchy page).

use actix_web::{get, HttpResponse, Responder};

use registration_security_core::http::security::AuthenticatedUser;

#[get("/homepage.html")]
pub async fn homepage(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().body(format!(
        "Welcome, {}!\nRoles: {:?}\nAuthorities: {:?}",
        user.get_email(),
        user.get_roles(),
        user.get_authorities()
    ))
}

/// Reachable by STAFF and everything above it in the hierarchy.
#[get("/roleHierarchy")]
pub async fn role_hierarchy(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().body(format!(
        "Role Hierarchy\n\nLogged in as: {}",
        user.get_email()
    ))
}
