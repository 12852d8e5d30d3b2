//! Form login, logout and the one-session-per-user limit.

mod common;

use actix_web::http::StatusCode;
use actix_web::test;

use registration_security_app::settings::SecuritySettings;
use registration_security_core::http::security::{ConcurrencyPolicy, SecurityEventType};

use common::{
    cookie, create_test_app, location, login, login_request, test_security, test_security_with,
};

#[actix_web::test]
async fn test_bad_credentials_redirect_to_error() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;

    let resp = test::call_service(&app, login_request("test@test.com", "wrong").to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/login?error=true"));

    let resp =
        test::call_service(&app, login_request("nobody@test.com", "test").to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/login?error=true"));

    assert_eq!(ctx.count(SecurityEventType::AuthenticationFailure), 2);
}

#[actix_web::test]
async fn test_second_login_invalidates_first() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;

    let first = login(&app, "test@test.com", "test").await;
    let second = login(&app, "test@test.com", "test").await;

    let req = test::TestRequest::get()
        .uri("/homepage.html")
        .cookie(first)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp).as_deref(), Some("/invalidSession.html"));

    let req = test::TestRequest::get()
        .uri("/homepage.html")
        .cookie(second)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(ctx.count(SecurityEventType::SessionEvicted), 1);
    assert_eq!(
        ctx.security
            .sessions()
            .registry()
            .sessions_for("test@test.com", false)
            .len(),
        1
    );
}

#[actix_web::test]
async fn test_reject_new_keeps_first_session() {
    let ctx = test_security_with(SecuritySettings {
        concurrency_policy: ConcurrencyPolicy::RejectNew,
        ..SecuritySettings::default()
    });
    let app = create_test_app(&ctx.security).await;

    let first = login(&app, "test@test.com", "test").await;
    let resp = test::call_service(&app, login_request("test@test.com", "test").to_request()).await;
    assert_eq!(location(&resp).as_deref(), Some("/login?error=true"));

    let req = test::TestRequest::get()
        .uri("/homepage.html")
        .cookie(first)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_logout_ends_session() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;
    let session = login(&app, "test@test.com", "test").await;

    let req = test::TestRequest::get()
        .uri("/logout")
        .cookie(session.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(location(&resp).as_deref(), Some("/logout.html?logSucc=true"));
    let removal = cookie(&resp, "JSESSIONID").expect("session cookie removal");
    assert_eq!(removal.value(), "");
    assert!(cookie(&resp, "remember-me").is_some());
    assert_eq!(ctx.count(SecurityEventType::Logout), 1);

    let req = test::TestRequest::get()
        .uri("/homepage.html")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp).as_deref(), Some("/invalidSession.html"));
}

#[actix_web::test]
async fn test_logout_accepts_post() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;
    let session = login(&app, "test@test.com", "test").await;

    let req = test::TestRequest::post()
        .uri("/logout")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(location(&resp).as_deref(), Some("/logout.html?logSucc=true"));
}
