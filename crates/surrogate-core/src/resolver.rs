//! Host-restriction resolution (§4.E/§5/§9). `restrict_to_specified_host`
//! may be an IPv4 literal (the common case) or a hostname that needs an
//! async DNS lookup; either way resolution is best-effort and uncached —
//! a config value as small and rarely read as this one doesn't earn a
//! cache layer.

use std::net::{IpAddr, Ipv4Addr};

use crate::config_map::{self, ConfigValue};
use crate::controller::Controller;

/// Resolve a `restrict_to_specified_host` value to the set of addresses it
/// refers to. `None` in means "no restriction configured"; `None` out means
/// the same. A hostname that fails to resolve yields `Some(vec![])`, which
/// callers should treat as "nothing matches", not "no restriction".
pub async fn resolve_restriction(host: Option<&str>) -> Option<Vec<IpAddr>> {
    let host = host?;

    if let Ok(literal) = host.parse::<Ipv4Addr>() {
        return Some(vec![IpAddr::V4(literal)]);
    }

    match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => Some(addrs.map(|a| a.ip()).collect()),
        Err(err) => {
            tracing::warn!(host, error = %err, "host restriction failed to resolve");
            Some(Vec::new())
        }
    }
}

/// Whether an inbound control connection from `addr` should be accepted,
/// per the controller's current `restrict_to_specified_host` setting.
pub async fn connection_is_allowed(controller: &Controller, addr: &Ipv4Addr) -> bool {
    let restrict_host = {
        let inner = controller.0.borrow();
        inner
            .options
            .borrow()
            .get(config_map::RESTRICT_TO_SPECIFIED_HOST)
            .and_then(ConfigValue::as_str)
            .map(str::to_owned)
    };

    match resolve_restriction(restrict_host.as_deref()).await {
        None => true,
        Some(allowed) => allowed.iter().any(|a| *a == IpAddr::V4(*addr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_restriction_allows_everything() {
        assert_eq!(resolve_restriction(None).await, None);
    }

    #[tokio::test]
    async fn ipv4_literal_resolves_without_a_lookup() {
        let resolved = resolve_restriction(Some("192.168.1.50")).await.unwrap();
        assert_eq!(resolved, vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50))]);
    }
}
