//! Geolocation capability backed by the ipapi.co HTTP API

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{FieldSpec, Tool, ToolError, ValidatedInput};
use crate::validate::FieldKind;

const DEFAULT_ENDPOINT: &str = "https://ipapi.co";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Location and organization lookup for an IPv4 address.
pub struct IpLocationTool {
    endpoint: String,
}

impl IpLocationTool {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Point the tool at a different endpoint (used by tests).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    fn lookup_url(&self, address: &str) -> String {
        format!("{}/{}/json/", self.endpoint.trim_end_matches('/'), address)
    }
}

impl Default for IpLocationTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    error: bool,
    reason: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    continent_code: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    org: Option<String>,
}

fn field(value: Option<String>) -> String {
    value.unwrap_or_else(|| "N/A".to_string())
}

fn coord(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

#[async_trait]
impl Tool for IpLocationTool {
    fn name(&self) -> &'static str {
        "ip_location"
    }

    fn description(&self) -> &'static str {
        "Get relevant location and organization information for an IPv4 address."
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &[FieldSpec {
            name: "address",
            kind: FieldKind::Ipv4,
            description: "An IPv4 address such as 208.91.197.27, with no CIDR notation",
        }]
    }

    async fn invoke(&self, input: ValidatedInput) -> Result<String, ToolError> {
        let address = input.as_str();
        let url = self.lookup_url(address);
        debug!(%url, "ip_location: querying");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(format!("vigil/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::failed(format!("Failed to build HTTP client: {e}")))?;

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolError::failed(format!("Geolocation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::failed(format!(
                "Geolocation service returned HTTP {}",
                status.as_u16()
            )));
        }

        let geo: GeoResponse = response
            .json()
            .await
            .map_err(|e| ToolError::failed(format!("Malformed geolocation response: {e}")))?;

        if geo.error {
            return Err(ToolError::failed(format!(
                "Geolocation lookup failed: {}",
                field(geo.reason)
            )));
        }

        Ok(format!(
            "location: {}, {} - {} ({})\ncoordinates: Latitude: {} - Longitude: {}\norganization: {}",
            field(geo.city),
            field(geo.region),
            field(geo.country_name),
            field(geo.continent_code),
            coord(geo.latitude),
            coord(geo.longitude),
            field(geo.org),
        ))
    }
}
