//! Registration security demo server.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};

use registration_security_app::error::AppError;
use registration_security_app::security::{self, Security};
use registration_security_app::settings::AppSettings;
use registration_security_app::{handlers, init_tracing};
use registration_security_core::http::security::{AuditLogger, BCryptPasswordEncoder};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    Ok(run().await?)
}

async fn run() -> Result<(), AppError> {
    let settings = AppSettings::load()?;
    init_tracing(&settings.logging);

    let encoder = Arc::new(BCryptPasswordEncoder::with_cost(settings.security.bcrypt_cost));
    let users = Arc::new(security::seed_users(encoder.as_ref())?);
    let location = security::location_checker(settings.security.geoip_database.as_deref());

    let security = Security::new(
        &settings.security,
        users,
        encoder,
        location,
        AuditLogger::with_tracing(),
    )?;
    let key = security::session_key(&settings.security)?;

    let address = (settings.server.host.clone(), settings.server.port);
    tracing::info!(host = %address.0, port = address.1, "Starting server");
    tracing::info!("Demo users: test@test.com/test, manager@test.com/test, staff@test.com/staff, admin@test.com/admin");

    let data = web::Data::new(security.clone());
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(security.transform())
            .wrap(security.session_middleware(key.clone()))
            .configure(handlers::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
