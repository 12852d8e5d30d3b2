use actix_web::{error, http::StatusCode, HttpResponse, HttpResponseBuilder};
use derive_more::{Display, Error};

/// Failure raised by the security extractors.
///
/// The response carries no body so nothing about the failing check leaks.
#[derive(Debug, Display, Error)]
pub enum AuthError {
    #[display("authentication required")]
    Unauthenticated,
}

impl error::ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match *self {
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponseBuilder::new(self.status_code()).finish()
    }
}
