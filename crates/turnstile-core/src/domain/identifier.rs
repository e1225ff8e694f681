//! Caller identifiers - the partition key each counter is stored under.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Address used when a request carries no usable source address at all.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// A caller identifier, namespaced by how the caller was recognised.
///
/// Renders as `user:<id>` or `addr:<address>`; the prefix keeps a user whose
/// id happens to look like an address from sharing a bucket with that address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    User(String),
    Address(String),
}

impl Identifier {
    /// Resolve the identifier for a request.
    ///
    /// An authenticated user id wins. Otherwise the first hop of the
    /// forwarded-for chain is used, then the direct peer address, then
    /// [`UNKNOWN_ADDRESS`].
    pub fn resolve(
        user_id: Option<&str>,
        forwarded_for: Option<&str>,
        peer_addr: Option<&str>,
    ) -> Self {
        if let Some(user) = user_id.map(str::trim).filter(|u| !u.is_empty()) {
            return Identifier::User(user.to_string());
        }

        let forwarded = forwarded_for
            .and_then(|chain| chain.split(',').next())
            .and_then(normalize_address);

        let address = forwarded
            .or_else(|| peer_addr.and_then(normalize_address))
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());

        Identifier::Address(address)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Identifier::User(_) => "user",
            Identifier::Address(_) => "addr",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Identifier::User(v) | Identifier::Address(v) => v,
        }
    }

    /// Form that is safe to put in logs: the kind plus a short prefix of the
    /// value, never the whole value.
    pub fn redacted(&self) -> String {
        let value = self.value();
        let shown = (value.chars().count() / 2).min(4);
        let prefix: String = value.chars().take(shown).collect();
        format!("{}:{}***", self.kind(), prefix)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.value())
    }
}

/// Canonicalise one address entry. Blank entries count as absent.
///
/// Socket forms (`1.2.3.4:80`, `[::1]:80`) lose their port, IPv6 is rendered
/// in compressed lowercase form and IPv4-mapped IPv6 collapses to IPv4, so the
/// same host always lands in the same bucket. Anything unparseable is kept
/// as-is.
fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let ip = trimmed
        .parse::<SocketAddr>()
        .map(|addr| addr.ip())
        .or_else(|_| trimmed.parse::<IpAddr>())
        .or_else(|_| {
            trimmed
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .unwrap_or(trimmed)
                .parse::<IpAddr>()
        });

    match ip {
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => Some(v4.to_string()),
            None => Some(v6.to_string()),
        },
        Ok(ip) => Some(ip.to_string()),
        Err(_) => Some(trimmed.to_string()),
    }
}
