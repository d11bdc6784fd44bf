//! Geolocation over an ipinfo-compatible JSON API.
//!
//! Uses `ureq` for synchronous HTTP requests with a per-request timeout.
//! Transport failures are retried a bounded number of times; HTTP status
//! errors (bad token, quota) are not.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GeolocationConfig;
use crate::error::{ForensicError, Result};
use crate::geo::countries::country_name;
use crate::geo::GeoLocator;
use crate::model::evidence::GeoLocation;
use crate::trace::is_public;

/// Response body of `GET /{ip}`. Every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpInfoResponse {
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    /// `"lat,lon"`
    loc: Option<String>,
    org: Option<String>,
    bogon: Option<bool>,
}

/// Client for ipinfo.io or a compatible service.
pub struct IpInfoClient {
    agent: ureq::Agent,
    endpoint: String,
    token: Option<String>,
    retries: u32,
}

impl IpInfoClient {
    /// Build a client from configuration. The token is resolved from the
    /// environment first, then the config file; a missing token means
    /// anonymous (rate-limited) access.
    pub fn from_config(config: &GeolocationConfig) -> Self {
        Self::new(
            &config.endpoint,
            config.resolved_token(),
            Duration::from_secs(config.timeout_secs.max(1)),
            config.retries,
        )
    }

    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration, retries: u32) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            retries,
        }
    }

    fn fetch(&self, ip: Ipv4Addr) -> Result<IpInfoResponse> {
        let url = format!("{}/{}", self.endpoint, ip);
        let attempts = self.retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let mut request = self.agent.get(&url).set("Accept", "application/json");
            if let Some(token) = &self.token {
                request = request.query("token", token);
            }

            match request.call() {
                Ok(response) => {
                    return response.into_json::<IpInfoResponse>().map_err(|e| {
                        ForensicError::geo(ip, format!("invalid response body: {e}"))
                    });
                }
                Err(ureq::Error::Status(code, _)) => {
                    let reason = match code {
                        401 | 403 => "invalid or missing API token".to_string(),
                        429 => "request quota exceeded".to_string(),
                        _ => format!("HTTP error {code}"),
                    };
                    return Err(ForensicError::geo(ip, reason));
                }
                Err(ureq::Error::Transport(transport)) => {
                    warn!(%ip, attempt, attempts, error = %transport, "Geolocation transport error");
                    last_error = transport.to_string();
                }
            }
        }

        Err(ForensicError::geo(
            ip,
            format!("network error after {attempts} attempt(s): {last_error}"),
        ))
    }
}

impl GeoLocator for IpInfoClient {
    fn locate(&self, ip: Ipv4Addr) -> Result<GeoLocation> {
        if !is_public(ip) {
            return Err(ForensicError::geo(
                ip,
                "address is private or reserved; no geolocation data",
            ));
        }
        debug!(%ip, endpoint = %self.endpoint, "Querying geolocation service");
        let response = self.fetch(ip)?;
        into_location(ip, response)
    }
}

/// Validate a provider response and turn it into a [`GeoLocation`].
fn into_location(ip: Ipv4Addr, response: IpInfoResponse) -> Result<GeoLocation> {
    if response.bogon == Some(true) {
        return Err(ForensicError::geo(ip, "bogon address; no geolocation data"));
    }

    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let loc = present(response.loc)
        .ok_or_else(|| ForensicError::geo(ip, "response has no coordinates"))?;
    let (latitude, longitude) = parse_loc(&loc)
        .ok_or_else(|| ForensicError::geo(ip, format!("unparsable coordinates '{loc}'")))?;
    let city =
        present(response.city).ok_or_else(|| ForensicError::geo(ip, "response has no city"))?;
    let code = present(response.country)
        .ok_or_else(|| ForensicError::geo(ip, "response has no country"))?;

    let country_name = country_name(&code)
        .map(str::to_string)
        .unwrap_or_else(|| code.clone());

    Ok(GeoLocation {
        ip,
        city,
        country_name,
        latitude,
        longitude,
        country_code: Some(code),
        region: present(response.region),
        org: present(response.org),
    })
}

/// Parse `"lat,lon"`, rejecting out-of-range values.
fn parse_loc(loc: &str) -> Option<(f64, f64)> {
    let (lat, lon) = loc.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)).then_some((lat, lon))
}
