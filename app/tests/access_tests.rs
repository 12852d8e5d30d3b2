//! URL rules: role hierarchy, authorities and anonymous-only pages.

mod common;

use actix_web::http::StatusCode;
use actix_web::test;

use common::{create_test_app, location, login, test_security};

#[actix_web::test]
async fn test_admin_inherits_staff_role() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;
    let session = login(&app, "admin@test.com", "admin").await;

    let req = test::TestRequest::get()
        .uri("/roleHierarchy")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_staff_reaches_role_hierarchy() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;
    let session = login(&app, "staff@test.com", "staff").await;

    let req = test::TestRequest::get()
        .uri("/roleHierarchy")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_user_cannot_reach_role_hierarchy() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;
    let session = login(&app, "test@test.com", "test").await;

    let req = test::TestRequest::get()
        .uri("/roleHierarchy")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(location(&resp).as_deref(), Some("/accessDenied"));
}

#[actix_web::test]
async fn test_update_password_requires_authority() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;

    let session = login(&app, "manager@test.com", "test").await;
    let req = test::TestRequest::get()
        .uri("/user/updatePassword")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp).as_deref(), Some("/accessDenied"));

    let session = login(&app, "test@test.com", "test").await;
    let req = test::TestRequest::get()
        .uri("/user/updatePassword")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_homepage_requires_read_privilege() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;
    let session = login(&app, "test@test.com", "test").await;

    let req = test::TestRequest::get()
        .uri("/homepage.html")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("test@test.com"));
}

#[actix_web::test]
async fn test_invalid_session_page_is_anonymous_only() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;

    let req = test::TestRequest::get().uri("/invalidSession.html").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let session = login(&app, "test@test.com", "test").await;
    let req = test::TestRequest::get()
        .uri("/invalidSession.html")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp).as_deref(), Some("/accessDenied"));
}

#[actix_web::test]
async fn test_public_pages_need_no_login() {
    let ctx = test_security();
    let app = create_test_app(&ctx.security).await;

    for uri in ["/login", "/login?error=true", "/logout.html"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
    }
}
