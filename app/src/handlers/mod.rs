//! Route handlers organized by access level.

use actix_web::web;

pub mod home;
pub mod management;
pub mod public;
pub mod user;

/// Registers every page and the login/logout endpoints.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(public::login_page)
        .service(public::login)
        .service(public::logout)
        .service(public::logout_page)
        .service(public::access_denied)
        .service(public::invalid_session)
        .service(home::homepage)
        .service(home::role_hierarchy)
        .service(management::management)
        .service(user::update_password);
}
