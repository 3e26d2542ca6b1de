//! URL and mission-input validation
//!
//! The URL predicate is the scraper's SSRF gate: only public http(s)
//! targets pass. Hostnames are additionally resolved so a DNS entry
//! pointing into a private range is caught before the browser ever
//! navigates.

use crate::error::{Result, ToolError};
use std::net::IpAddr;
use url::{Host, Url};

const URL_MAX_LEN: usize = 2048;

const BLOCKED_HOSTS: &[&str] = &["localhost", "metadata.google.internal"];

const INPUT_MIN_CHARS: usize = 3;
const INPUT_MAX_CHARS: usize = 1000;

/// Obvious injection markers; checked case-insensitively.
const DANGEROUS_PATTERNS: &[&str] = &[
    "<script",
    "javascript:",
    "onerror=",
    "onload=",
    "select *",
    "drop table",
    "union select",
    "insert into",
    "delete from",
    "update set",
];

fn is_blocked_ip(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_unspecified()
                || v4.is_link_local()
                || v4.is_private()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

/// Syntactic part of the SSRF predicate: scheme, length, host name and
/// IP-literal checks. No network access.
pub fn validate_url_syntax(url: &str) -> Result<Url> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ToolError::UnsafeUrl("url is empty".to_string()));
    }
    if url.len() > URL_MAX_LEN {
        return Err(ToolError::UnsafeUrl(format!(
            "url exceeds maximum length of {} characters",
            URL_MAX_LEN
        )));
    }

    let parsed = Url::parse(url).map_err(|e| ToolError::UnsafeUrl(format!("invalid url: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ToolError::UnsafeUrl(format!(
                "scheme must be http or https, got: {}",
                other
            )))
        }
    }

    match parsed.host() {
        None => return Err(ToolError::UnsafeUrl("url has no host".to_string())),
        Some(Host::Domain(domain)) => {
            let lower = domain.to_lowercase();
            if BLOCKED_HOSTS.iter().any(|blocked| lower == *blocked) {
                return Err(ToolError::UnsafeUrl(format!(
                    "access to {} is not allowed",
                    domain
                )));
            }
        }
        Some(Host::Ipv4(addr)) => {
            if is_blocked_ip(IpAddr::V4(addr)) {
                return Err(ToolError::UnsafeUrl(format!(
                    "access to {} is not allowed",
                    addr
                )));
            }
        }
        Some(Host::Ipv6(addr)) => {
            if is_blocked_ip(IpAddr::V6(addr)) {
                return Err(ToolError::UnsafeUrl(format!(
                    "access to {} is not allowed",
                    addr
                )));
            }
        }
    }

    Ok(parsed)
}

/// Full SSRF predicate: syntax checks plus DNS resolution of hostname
/// targets. A name that resolves into a blocked range is rejected even
/// though the literal text looks harmless.
pub async fn validate_url(url: &str) -> Result<Url> {
    let parsed = validate_url_syntax(url)?;

    if let Some(Host::Domain(domain)) = parsed.host() {
        let port = parsed.port_or_known_default().unwrap_or(80);
        // Resolution failure is left for the fetch itself to report.
        if let Ok(addrs) = tokio::net::lookup_host((domain, port)).await {
            for addr in addrs {
                if is_blocked_ip(addr.ip()) {
                    return Err(ToolError::UnsafeUrl(format!(
                        "{} resolves to blocked address {}",
                        domain,
                        addr.ip()
                    )));
                }
            }
        }
    }

    Ok(parsed)
}

/// Sanity-check a mission objective before any work starts.
pub fn validate_mission_input(input: &str) -> Result<()> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ToolError::InvalidInput("input cannot be empty".to_string()));
    }

    let chars = trimmed.chars().count();
    if chars < INPUT_MIN_CHARS {
        return Err(ToolError::InvalidInput(format!(
            "input must be at least {} characters",
            INPUT_MIN_CHARS
        )));
    }
    if chars > INPUT_MAX_CHARS {
        return Err(ToolError::InvalidInput(format!(
            "input exceeds maximum length of {} characters",
            INPUT_MAX_CHARS
        )));
    }

    let lower = trimmed.to_lowercase();
    for pattern in DANGEROUS_PATTERNS {
        if lower.contains(pattern) {
            return Err(ToolError::InvalidInput(format!(
                "input contains disallowed pattern: {}",
                pattern
            )));
        }
    }

    Ok(())
}
