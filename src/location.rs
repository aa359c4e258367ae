//! Best-effort location resolution with a fixed-coordinate fallback.
//!
//! Location is an enhancement, not a required input: any failure (network,
//! timeout, unusable payload) falls back to [`DEFAULT_COORDINATES`] with a
//! logged warning and is never surfaced to the caller as an error.

use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::time::Duration;

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

/// Position used when resolution fails: San Francisco.
pub const DEFAULT_COORDINATES: Coordinates = Coordinates {
    latitude: 37.7749,
    longitude: -122.4194,
};

const DEFAULT_ENDPOINT: &str = "http://ip-api.com/json";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for [`LocationResolver`].
#[derive(Debug, Clone)]
pub struct LocationResolverBuilder {
    endpoint: String,
    timeout: Duration,
    fallback: Coordinates,
}

impl Default for LocationResolverBuilder {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            fallback: DEFAULT_COORDINATES,
        }
    }
}

impl LocationResolverBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the geolocation endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the maximum time to wait for a position.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the coordinates returned when resolution fails.
    pub fn fallback(mut self, fallback: Coordinates) -> Self {
        self.fallback = fallback;
        self
    }

    /// Builds the resolver.
    pub fn build(self) -> LocationResolver {
        LocationResolver {
            client: reqwest::Client::new(),
            endpoint: self.endpoint,
            timeout: self.timeout,
            fallback: self.fallback,
        }
    }
}

/// Resolves the user's approximate position from their public IP address.
pub struct LocationResolver {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    fallback: Coordinates,
}

impl LocationResolver {
    /// Creates a new `LocationResolverBuilder`.
    pub fn builder() -> LocationResolverBuilder {
        LocationResolverBuilder::new()
    }

    /// Resolves a position, falling back to the default pair on any failure.
    ///
    /// Each call performs a fresh lookup; no prior position is reused.
    pub async fn resolve(&self) -> Coordinates {
        match self.try_resolve().await {
            Ok(coords) => coords,
            Err(e) => {
                tracing::warn!("geolocation failed or timed out, using fallback: {e}");
                self.fallback
            }
        }
    }

    async fn try_resolve(&self) -> Result<Coordinates> {
        let response = self
            .client
            .get(&self.endpoint)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Api {
                status: status.as_u16(),
                message: "geolocation lookup failed".into(),
            });
        }

        let position: IpPosition = response.json().await?;
        if position.status != "success" {
            return Err(SyncError::UnexpectedResponse(format!(
                "geolocation endpoint returned status {:?}",
                position.status
            )));
        }

        Ok(Coordinates {
            latitude: position.lat,
            longitude: position.lon,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IpPosition {
    #[serde(default)]
    status: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}
