//! Caller address resolution and allow-list subnet matching.
//!
//! # Security Warning: IP Spoofing Risk
//!
//! **The resolution functions trust client-provided headers.** A direct
//! client can place any address in `X-Real-Ip` or `X-Forwarded-For`, and
//! callers inside the allow-list subnet skip token validation entirely.
//! The subnet check is therefore a coarse trust boundary, not a security
//! proof: it is only sound when the network topology guarantees header
//! integrity, i.e. this service is reachable exclusively through a reverse
//! proxy that overwrites those headers:
//!
//! ```nginx
//! proxy_set_header X-Real-IP $remote_addr;
//! proxy_set_header X-Forwarded-For $remote_addr;
//! ```
//!
//! # Fail-Closed Bias
//!
//! Anything that cannot be parsed as an IP address (including the
//! [`UNKNOWN_ADDR`] fallback) is treated as outside the subnet and must
//! present a token. Ambiguity never grants admission.

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use tracing::debug;

use crate::error::{GateError, GateResult};

/// Fallback value when no caller address can be determined. Does not parse
/// as an IP, so such callers always fail the subnet check.
pub const UNKNOWN_ADDR: &str = "unknown";

/// Resolve the caller's address from request metadata.
///
/// Checks in order (returns first match):
/// 1. `X-Real-Ip` header
/// 2. `X-Forwarded-For` header (first entry in a comma-separated list)
/// 3. Transport peer address from [`ConnectInfo`], port stripped
/// 4. Falls back to [`UNKNOWN_ADDR`]
#[inline]
pub fn resolve_client_addr<B>(req: &Request<B>) -> Cow<'static, str> {
    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return Cow::Owned(value.trim().to_string());
    }

    // Format: "client, proxy1, proxy2" - the first entry is the client
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first) = value.split(',').next()
        && !first.trim().is_empty()
    {
        return Cow::Owned(first.trim().to_string());
    }

    if let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Cow::Owned(peer.ip().to_string());
    }

    Cow::Borrowed(UNKNOWN_ADDR)
}

/// Parsed CIDR range exempted from token checks.
#[derive(Debug, Clone, Copy)]
pub struct Subnet {
    /// Network address
    network: IpAddr,
    /// Prefix length (e.g. 24 for /24)
    prefix_len: u8,
}

impl Subnet {
    /// Parse CIDR notation (e.g. `"10.0.0.0/8"` or `"::1/128"`). A bare IP
    /// is accepted as an implicit /32 or /128.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Config` on malformed input; the gate refuses to
    /// construct rather than run with a half-configured allow-list.
    pub fn parse(cidr: &str) -> GateResult<Self> {
        let bad = || GateError::Config(format!("invalid allow-list subnet: {cidr:?}"));
        let trimmed = cidr.trim();

        let (addr_part, prefix_part) = match trimmed.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (trimmed, None),
        };

        let network: IpAddr = addr_part.parse().map_err(|_| bad())?;
        let max_prefix = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };

        let prefix_len = match prefix_part {
            Some(p) => p.parse::<u8>().map_err(|_| bad())?,
            None => max_prefix,
        };
        if prefix_len > max_prefix {
            return Err(bad());
        }

        Ok(Self {
            network,
            prefix_len,
        })
    }

    /// Check whether an IP address falls within this range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let net_bits = u32::from(*net);
                let addr_bits = u32::from(*addr);
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - self.prefix_len)
                };
                (net_bits & mask) == (addr_bits & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let net_bits = u128::from(*net);
                let addr_bits = u128::from(*addr);
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u128::MAX << (128 - self.prefix_len)
                };
                (net_bits & mask) == (addr_bits & mask)
            }
            // IPv4 and IPv6 don't match
            _ => false,
        }
    }

    /// Check whether a textual caller address is inside this range.
    ///
    /// Fails closed: an address that does not parse is never trusted.
    pub fn contains_str(&self, addr: &str) -> bool {
        match addr.parse::<IpAddr>() {
            Ok(ip) => self.contains(&ip),
            Err(_) => {
                debug!(addr, "Caller address did not parse, treating as untrusted");
                false
            }
        }
    }
}
