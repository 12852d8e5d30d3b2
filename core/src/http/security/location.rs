//! Login location anomaly detection.
//!
//! # Spring Equivalent
//! `DifferentLocationChecker` registered as post-authentication checks, backed
//! by a GeoLite2 country database
//!
//! The checker resolves the client IP to an ISO country code and compares it
//! with the country recorded for the account. Lookups never block a login on
//! their own: a missing database, a private address or a lookup error all
//! produce [`LocationCheck::Unknown`].

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use derive_more::{Display, Error};
use maxminddb::MaxMindDBError;
use serde::Deserialize;

use crate::http::security::user::User;

#[derive(Debug, Display, Error)]
pub enum GeoLookupError {
    #[display("geolocation unavailable: {reason}")]
    Unavailable {
        #[error(not(source))]
        reason: String,
    },
}

/// Maps an IP address to an ISO 3166 country code.
pub trait GeoIpResolver: Send + Sync {
    /// `Ok(None)` when the database has no country for the address.
    fn country_of(&self, ip: IpAddr) -> Result<Option<String>, GeoLookupError>;
}

/// Resolver over a MaxMind GeoLite2/GeoIP2 country database read into memory once.
pub struct MaxMindCountryResolver {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxMindCountryResolver {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GeoLookupError> {
        let path = path.as_ref();
        let reader = maxminddb::Reader::open_readfile(path).map_err(|e| {
            GeoLookupError::Unavailable {
                reason: format!("{}: {}", path.display(), e),
            }
        })?;
        Ok(MaxMindCountryResolver { reader })
    }
}

impl fmt::Debug for MaxMindCountryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxMindCountryResolver")
            .field("database_type", &self.reader.metadata.database_type)
            .finish()
    }
}

impl GeoIpResolver for MaxMindCountryResolver {
    fn country_of(&self, ip: IpAddr) -> Result<Option<String>, GeoLookupError> {
        country_code(self.reader.lookup::<maxminddb::geoip2::Country>(ip))
    }
}

/// Maps a database answer to an ISO code. An address the database does not
/// list is not an error.
fn country_code(
    lookup: Result<maxminddb::geoip2::Country<'_>, MaxMindDBError>,
) -> Result<Option<String>, GeoLookupError> {
    match lookup {
        Ok(record) => Ok(record
            .country
            .and_then(|country| country.iso_code)
            .map(str::to_string)),
        Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
        Err(e) => Err(GeoLookupError::Unavailable {
            reason: e.to_string(),
        }),
    }
}

/// Fixed IP to country table.
#[derive(Debug, Default, Clone)]
pub struct InMemoryGeoIpResolver {
    countries: HashMap<IpAddr, String>,
}

impl InMemoryGeoIpResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_country(mut self, ip: IpAddr, iso_code: &str) -> Self {
        self.countries.insert(ip, iso_code.to_string());
        self
    }
}

impl GeoIpResolver for InMemoryGeoIpResolver {
    fn country_of(&self, ip: IpAddr) -> Result<Option<String>, GeoLookupError> {
        Ok(self.countries.get(&ip).cloned())
    }
}

/// What to do when a login comes from an unexpected country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPolicy {
    /// Let the login through and publish a suspicious-location event.
    #[default]
    Notify,
    /// Fail the login.
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationCheck {
    Match,
    Mismatch { known: String, current: String },
    /// Nothing to compare. `resolved` carries the request's country when
    /// the account has no recorded one yet.
    Unknown { resolved: Option<String> },
}

impl LocationCheck {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, LocationCheck::Mismatch { .. })
    }
}

/// Compares a login's country with the account's last known one.
#[derive(Clone, Default)]
pub struct LocationChecker {
    resolver: Option<Arc<dyn GeoIpResolver>>,
}

impl fmt::Debug for LocationChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationChecker")
            .field("enabled", &self.resolver.is_some())
            .finish()
    }
}

impl LocationChecker {
    pub fn new(resolver: Arc<dyn GeoIpResolver>) -> Self {
        LocationChecker {
            resolver: Some(resolver),
        }
    }

    /// A checker that always answers `Unknown`.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.resolver.is_some()
    }

    /// Resolves `ip` to a country, swallowing lookup failures.
    pub fn resolve(&self, ip: Option<IpAddr>) -> Option<String> {
        let (resolver, ip) = (self.resolver.as_ref()?, ip?);
        match resolver.country_of(ip) {
            Ok(country) => country,
            Err(e) => {
                tracing::warn!(%ip, error = %e, "Country lookup failed, skipping location check");
                None
            }
        }
    }

    pub fn check(&self, user: &User, ip: Option<IpAddr>) -> LocationCheck {
        let current = self.resolve(ip);
        match (user.get_last_known_country(), current) {
            (_, None) => LocationCheck::Unknown { resolved: None },
            (None, Some(current)) => LocationCheck::Unknown {
                resolved: Some(current),
            },
            (Some(known), Some(current)) if known.eq_ignore_ascii_case(&current) => {
                LocationCheck::Match
            }
            (Some(known), Some(current)) => LocationCheck::Mismatch {
                known: known.to_string(),
                current,
            },
        }
    }
}
