//! Traits describing provider capabilities and shared error types.

use async_trait::async_trait;
use chrono::ParseError as ChronoParseError;
use reqwest::Error as ReqwestError;

use crate::model::{AddressBinding, AddressQuery, ProviderMeta, RawCalendar};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to provider backends.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Failed to parse a date from the provider response.
    #[error("Parse error: {0}")]
    Parse(#[from] ChronoParseError),
    /// A month name in the response matched no known Norwegian month.
    #[error("Unknown month name: {0}")]
    UnknownMonth(String),
    /// Response body did not have the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),
    /// Requested address could not be found.
    #[error("Address not found")]
    AddressNotFound,
    /// Stored address identifier is invalid for the provider.
    #[error("Invalid address id")]
    InvalidAddressId,
    /// The provider has no registered plugin.
    #[error("Unsupported provider")]
    UnsupportedProvider,
    /// A required credential is not configured.
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

#[derive(Debug, Clone)]
/// Successful address probe: the identifier the provider wants to see on
/// later calendar requests.
pub struct ProbeMatch {
    /// Provider-side address identifier.
    pub address_id: String,
}

#[async_trait]
/// Trait for provider-specific address probing during discovery.
pub trait AddressProbe: Send + Sync {
    /// Metadata describing the provider handled by this port.
    fn meta(&self) -> &ProviderMeta;

    /// Check whether this provider serves the queried address.
    ///
    /// Returns `Ok(None)` when the provider does not know the address or
    /// cannot probe it with the available query parts.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails outright.
    async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError>;
}

#[async_trait]
/// Trait for provider-specific calendar backends.
pub trait CalendarPort: Send + Sync {
    /// Metadata describing the provider handled by this port.
    fn meta(&self) -> &ProviderMeta;

    /// Fetch the raw label/date calendar for a bound address.
    ///
    /// An empty calendar is a valid answer and means the provider currently
    /// lists no upcoming pickups for the address.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails or its
    /// response cannot be interpreted.
    async fn calendar(&self, binding: &AddressBinding) -> Result<RawCalendar, PortError>;
}
