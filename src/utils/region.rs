//! Client address and coarse region resolution for scan events.
//!
//! There is no geo-IP database behind this: the region comes from the
//! country header set by a fronting CDN/proxy when one is present, and
//! otherwise falls back to `Local` / `Unknown`.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

pub const REGION_LOCAL: &str = "Local";
pub const REGION_UNKNOWN: &str = "Unknown";

const COUNTRY_HEADERS: &[&str] = &["cf-ipcountry", "x-vercel-ip-country", "x-country-code"];

/// Resolves the originating client address, preferring proxy headers over the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        })
        .or_else(|| peer.map(|p| p.ip()))
}

pub fn derive_region(headers: &HeaderMap, ip: Option<IpAddr>) -> String {
    for name in COUNTRY_HEADERS {
        if let Some(code) = headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_uppercase())
            && code.len() == 2
            && code.chars().all(|c| c.is_ascii_alphabetic())
            && code != "XX"
        {
            return code;
        }
    }

    match ip {
        Some(ip) if is_local(&ip) => REGION_LOCAL.to_string(),
        _ => REGION_UNKNOWN.to_string(),
    }
}

fn is_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_local(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link local
        }
    }
}
