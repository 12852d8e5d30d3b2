use derive_more::{Display, Error, From};

use registration_security_core::http::security::{HierarchyError, PasswordEncodingError};

use crate::settings::SettingsError;

/// Startup failures.
#[derive(Debug, Display, Error, From)]
pub enum AppError {
    #[display("{_0}")]
    Settings(SettingsError),
    #[display("invalid role hierarchy: {_0}")]
    Hierarchy(HierarchyError),
    #[display("could not encode seed password: {_0}")]
    Encoding(PasswordEncodingError),
    #[display("invalid session signing key: must be at least 64 bytes")]
    #[from(ignore)]
    SigningKey,
    #[display("{_0}")]
    Io(std::io::Error),
}

impl From<AppError> for std::io::Error {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Io(e) => e,
            other => std::io::Error::other(other.to_string()),
        }
    }
}
