//! Common test utilities and configuration.
//!
//! This module provides shared test infrastructure including:
//! - A security setup with fast bcrypt and an in-memory GeoIP table
//! - A recording audit sink
//! - Test app builder and cookie helpers

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use actix_web::body::MessageBody;
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::header::LOCATION;
use actix_web::{test, web, App, Error};

use registration_security_app::handlers;
use registration_security_app::security::{seed_users, Security};
use registration_security_app::settings::SecuritySettings;
use registration_security_core::http::security::{
    AuditLogger, BCryptPasswordEncoder, InMemoryGeoIpResolver, LocationChecker, SecurityEvent,
    SecurityEventType,
};

pub const LONDON: &str = "81.2.69.160";
pub const NEW_YORK: &str = "216.160.83.56";

// =============================================================================
// Test Configuration
// =============================================================================

pub struct TestSecurity {
    pub security: Security,
    pub events: Arc<Mutex<Vec<SecurityEvent>>>,
}

impl TestSecurity {
    pub fn count(&self, event_type: SecurityEventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn of_type(&self, event_type: SecurityEventType) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

/// Seeded users:
/// - test@test.com/test: USER + READ_PRIVILEGE, CHANGE_PASSWORD_PRIVILEGE
/// - manager@test.com/test: MANAGER + READ_PRIVILEGE
/// - staff@test.com/staff: STAFF + READ_PRIVILEGE, CHANGE_PASSWORD_PRIVILEGE
/// - admin@test.com/admin: ADMIN + READ, WRITE, CHANGE_PASSWORD privileges
pub fn test_security_with(settings: SecuritySettings) -> TestSecurity {
    let encoder = Arc::new(BCryptPasswordEncoder::with_cost(4));
    let users = Arc::new(seed_users(encoder.as_ref()).unwrap());
    let geo = InMemoryGeoIpResolver::new()
        .with_country(LONDON.parse().unwrap(), "GB")
        .with_country(NEW_YORK.parse().unwrap(), "US");

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let audit = AuditLogger::new().with_handler(move |e| sink.lock().unwrap().push(e.clone()));

    let security = Security::new(
        &settings,
        users,
        encoder,
        LocationChecker::new(Arc::new(geo)),
        audit,
    )
    .unwrap();

    TestSecurity { security, events }
}

pub fn test_security() -> TestSecurity {
    test_security_with(SecuritySettings::default())
}

pub async fn create_test_app(
    security: &Security,
) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(security.clone()))
            .wrap(security.transform())
            .wrap(security.session_middleware(Key::generate()))
            .configure(handlers::configure),
    )
    .await
}

// =============================================================================
// Helpers
// =============================================================================

pub fn login_request(email: &str, password: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/login")
        .set_form([("username", email), ("password", password)])
}

pub fn remember_me_login_request(email: &str, password: &str) -> test::TestRequest {
    test::TestRequest::post().uri("/login").set_form([
        ("username", email),
        ("password", password),
        ("remember-me", "on"),
    ])
}

pub fn cookie<B>(resp: &ServiceResponse<B>, name: &str) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == name)
        .map(|c| c.into_owned())
}

pub fn location<B>(resp: &ServiceResponse<B>) -> Option<String> {
    resp.headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Logs in and returns the session cookie.
pub async fn login<S, B>(app: &S, email: &str, password: &str) -> Cookie<'static>
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = Error>,
{
    let resp = test::call_service(app, login_request(email, password).to_request()).await;
    assert_eq!(
        location(&resp).as_deref(),
        Some("/homepage.html"),
        "login of {email} failed"
    );
    cookie(&resp, "JSESSIONID").expect("session cookie")
}
