//! IP and DNS reconnaissance capabilities
//!
//! reverse_dns, resolve_host, and dns_records use the system resolver
//! through hickory; ping shells out to the system `ping` with a hard
//! deadline so a dead host cannot hang the session.

use std::net::{IpAddr, Ipv4Addr};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;
use tokio::process::Command;
use tracing::debug;

use super::{FieldSpec, Tool, ToolError, ValidatedInput};
use crate::validate::FieldKind;

const IPV4_FIELD: &[FieldSpec] = &[FieldSpec {
    name: "address",
    kind: FieldKind::Ipv4,
    description: "An IPv4 address such as 208.91.197.27, with no CIDR notation",
}];

const HOSTNAME_FIELD: &[FieldSpec] = &[FieldSpec {
    name: "hostname",
    kind: FieldKind::Hostname,
    description: "A DNS hostname such as www.google.com",
}];

fn resolver() -> TokioAsyncResolver {
    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
}

fn parse_validated_ipv4(input: &ValidatedInput) -> Result<Ipv4Addr, ToolError> {
    input
        .as_str()
        .parse::<Ipv4Addr>()
        .map_err(|_| ToolError::failed("address was not a parseable IPv4 address"))
}

fn no_records(err: &ResolveError) -> bool {
    matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

/// IPv4 address to DNS hostname (PTR lookup).
pub struct ReverseDnsTool;

#[async_trait]
impl Tool for ReverseDnsTool {
    fn name(&self) -> &'static str {
        "reverse_dns"
    }

    fn description(&self) -> &'static str {
        "Given an IPv4 address, returns the DNS hostname associated with it."
    }

    fn fields(&self) -> &'static [FieldSpec] {
        IPV4_FIELD
    }

    async fn invoke(&self, input: ValidatedInput) -> Result<String, ToolError> {
        let address = parse_validated_ipv4(&input)?;
        debug!(%address, "reverse_dns: PTR lookup");

        let lookup = resolver()
            .reverse_lookup(IpAddr::V4(address))
            .await
            .map_err(|e| {
                if no_records(&e) {
                    ToolError::NotFound {
                        what: "PTR record",
                        name: address.to_string(),
                    }
                } else {
                    ToolError::failed(format!("Reverse DNS lookup failed: {e}"))
                }
            })?;

        let names: Vec<String> = lookup
            .iter()
            .map(|ptr| ptr.to_string().trim_end_matches('.').to_string())
            .collect();
        if names.is_empty() {
            return Err(ToolError::NotFound {
                what: "PTR record",
                name: address.to_string(),
            });
        }
        Ok(names.join("\n"))
    }
}

/// DNS hostname to IPv4 address (A lookup).
pub struct ResolveHostTool;

#[async_trait]
impl Tool for ResolveHostTool {
    fn name(&self) -> &'static str {
        "resolve_host"
    }

    fn description(&self) -> &'static str {
        "Given a DNS hostname, retrieve the IPv4 address associated with it."
    }

    fn fields(&self) -> &'static [FieldSpec] {
        HOSTNAME_FIELD
    }

    async fn invoke(&self, input: ValidatedInput) -> Result<String, ToolError> {
        let hostname = input.as_str();
        debug!(hostname, "resolve_host: A lookup");

        let lookup = resolver().ipv4_lookup(hostname).await.map_err(|e| {
            if no_records(&e) {
                ToolError::NotFound {
                    what: "A record",
                    name: hostname.to_string(),
                }
            } else {
                ToolError::failed(format!("Hostname resolution failed: {e}"))
            }
        })?;

        let addresses: Vec<String> = lookup.iter().map(|a| a.to_string()).collect();
        if addresses.is_empty() {
            return Err(ToolError::NotFound {
                what: "A record",
                name: hostname.to_string(),
            });
        }
        Ok(addresses.join("\n"))
    }
}

/// A/AAAA/NS/MX record dump for a hostname.
pub struct DnsRecordsTool;

impl DnsRecordsTool {
    async fn section(
        resolver: &TokioAsyncResolver,
        hostname: &str,
        record_type: &str,
    ) -> Result<String, ToolError> {
        let records: Result<Vec<String>, ResolveError> = match record_type {
            "A" => resolver
                .ipv4_lookup(hostname)
                .await
                .map(|l| l.iter().map(|r| r.to_string()).collect()),
            "AAAA" => resolver
                .ipv6_lookup(hostname)
                .await
                .map(|l| l.iter().map(|r| r.to_string()).collect()),
            "NS" => resolver
                .ns_lookup(hostname)
                .await
                .map(|l| l.iter().map(|r| r.to_string()).collect()),
            "MX" => resolver
                .mx_lookup(hostname)
                .await
                .map(|l| l.iter().map(|r| r.to_string()).collect()),
            other => return Err(ToolError::failed(format!("Unsupported record type {other}"))),
        };

        match records {
            Ok(values) if values.is_empty() => {
                Ok(format!("No {record_type} record for this hostname."))
            }
            Ok(values) => Ok(format!("{record_type}: {}", values.join(", "))),
            Err(e) if no_records(&e) => Ok(format!("No {record_type} record for this hostname.")),
            Err(e) => Err(ToolError::failed(format!("{record_type} lookup failed: {e}"))),
        }
    }
}

#[async_trait]
impl Tool for DnsRecordsTool {
    fn name(&self) -> &'static str {
        "dns_records"
    }

    fn description(&self) -> &'static str {
        "Needs a DNS hostname. Retrieves the relevant DNS records (A, AAAA, NS, MX)."
    }

    fn fields(&self) -> &'static [FieldSpec] {
        HOSTNAME_FIELD
    }

    async fn invoke(&self, input: ValidatedInput) -> Result<String, ToolError> {
        let hostname = input.as_str();
        debug!(hostname, "dns_records: full record dump");
        let resolver = resolver();

        let mut sections = Vec::new();
        for record_type in ["A", "AAAA", "NS", "MX"] {
            sections.push(Self::section(&resolver, hostname, record_type).await?);
        }
        Ok(sections.join("\n"))
    }
}

/// Two-probe ping of an IPv4 address with a hard deadline.
pub struct PingTool {
    deadline: Duration,
}

impl PingTool {
    pub fn new() -> Self {
        Self {
            deadline: Duration::from_secs(2),
        }
    }
}

impl Default for PingTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for PingTool {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn description(&self) -> &'static str {
        "Given an IPv4 address, pings it twice and returns the ping output."
    }

    fn fields(&self) -> &'static [FieldSpec] {
        IPV4_FIELD
    }

    async fn invoke(&self, input: ValidatedInput) -> Result<String, ToolError> {
        let address = parse_validated_ipv4(&input)?;
        debug!(%address, "ping: probing");

        let child = Command::new("ping")
            .args(["-c", "2", &address.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::failed(format!("Failed to spawn ping: {e}")))?;

        let output = match tokio::time::timeout(self.deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ToolError::failed(format!("ping wait failed: {e}"))),
            Err(_) => {
                return Err(ToolError::failed(format!(
                    "ping to {address} timed out after {} seconds",
                    self.deadline.as_secs()
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::failed(format!(
                "ping produced no output: {}",
                stderr.trim()
            )));
        }
        Ok(stdout.into_owned())
    }
}
