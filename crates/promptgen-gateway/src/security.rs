//! Admin endpoint authorization
//!
//! A configured API key is the only accepted credential. Without one, access
//! falls back to the client IP: loopback or an explicit allowlist.

use axum::http::HeaderMap;
use std::net::IpAddr;

use crate::config::AdminSettings;

/// Header carrying the admin API key
pub const ADMIN_KEY_HEADER: &str = "x-admin-api-key";

/// Query parameter carrying the admin API key
pub const ADMIN_KEY_QUERY: &str = "admin_api_key";

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Outcome of an authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminDecision {
    pub authorized: bool,
    pub client_ip: Option<IpAddr>,
    /// Raw `X-Forwarded-For`, for audit logs
    pub forwarded_for: Option<String>,
    pub reason: &'static str,
}

/// Admin access policy
#[derive(Debug, Clone)]
pub struct AdminPolicy {
    settings: AdminSettings,
}

impl AdminPolicy {
    pub fn new(settings: AdminSettings) -> Self {
        Self { settings }
    }

    /// Best-effort client IP; proxy headers only when trusted
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
        if self.settings.trust_proxy_headers {
            let forwarded = headers
                .get(FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(forwarded) = forwarded {
                return forwarded.parse().ok();
            }
        }
        peer
    }

    /// Decide whether a request may use admin endpoints
    pub fn authorize(
        &self,
        headers: &HeaderMap,
        query_key: Option<&str>,
        peer: Option<IpAddr>,
    ) -> AdminDecision {
        let client_ip = self.client_ip(headers, peer);
        let forwarded_for = headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let decision = |authorized, reason| AdminDecision {
            authorized,
            client_ip,
            forwarded_for: forwarded_for.clone(),
            reason,
        };

        if let Some(expected) = self.settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            let provided = headers
                .get(ADMIN_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .or(query_key);

            return match provided {
                Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => {
                    decision(true, "valid API key")
                }
                _ => decision(false, "missing or invalid API key"),
            };
        }

        match client_ip {
            None => decision(false, "unable to determine client IP"),
            Some(ip) if ip.is_loopback() || self.settings.allowed_ips.contains(&ip) => {
                decision(true, "allowed client IP")
            }
            Some(_) => decision(false, "client IP not permitted"),
        }
    }
}

/// Compare secrets without short-circuiting on the first differing byte
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
