//! Target validation for hosts and CIDR networks.
//!
//! Hosts are accepted as IP addresses (IPv4 or IPv6) or hostnames; names are
//! kept as-is and resolved lazily by the prober at scan time. Networks use
//! CIDR notation and are capped so a typo cannot queue millions of hosts.

use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Maximum number of addresses allowed in a CIDR target.
pub const MAX_NET_HOSTS: u64 = 65536; // /16 for IPv4

/// Error type for target validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    #[error("invalid host address or name: '{0}'")]
    InvalidHost(String),
    #[error("invalid network: '{0}'")]
    InvalidNetwork(String),
    #[error("network too large: {0} addresses (max {1})")]
    NetworkTooLarge(u64, u64),
}

/// Validate a host token: an IP address or a plausible hostname.
///
/// Returns the token unchanged; resolution happens at scan time so a
/// transient DNS failure affects one scan, not the whole run.
pub fn parse_host(s: &str) -> Result<String, TargetError> {
    let s = s.trim();
    if s.parse::<IpAddr>().is_ok() {
        return Ok(s.to_string());
    }
    if is_valid_hostname(s) {
        return Ok(s.to_string());
    }
    Err(TargetError::InvalidHost(s.to_string()))
}

/// Validate a CIDR network token, enforcing [`MAX_NET_HOSTS`].
pub fn parse_net(s: &str) -> Result<IpNetwork, TargetError> {
    let network: IpNetwork = s
        .trim()
        .parse()
        .map_err(|_| TargetError::InvalidNetwork(s.to_string()))?;

    let count = host_count(&network);
    if count > MAX_NET_HOSTS {
        return Err(TargetError::NetworkTooLarge(count, MAX_NET_HOSTS));
    }
    Ok(network)
}

/// Number of addresses in a network, saturating at `u64::MAX` for the
/// enormous IPv6 prefixes that can never pass [`parse_net`] anyway.
pub fn host_count(network: &IpNetwork) -> u64 {
    match network {
        IpNetwork::V4(net) => u64::from(net.size()),
        IpNetwork::V6(net) => {
            let prefix = u32::from(net.prefix());
            if prefix >= 128 {
                1
            } else if 128 - prefix >= 64 {
                u64::MAX
            } else {
                1u64 << (128 - prefix)
            }
        }
    }
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    // Each label must be 1-63 characters, alphanumeric plus interior hyphens
    for label in s.split('.') {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if !label.chars().next().is_some_and(|c| c.is_alphanumeric()) {
            return false;
        }
        if !label.chars().last().is_some_and(|c| c.is_alphanumeric()) {
            return false;
        }
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_ipv4() {
        assert_eq!(parse_host("192.168.1.1").unwrap(), "192.168.1.1");
    }

    #[test]
    fn test_parse_host_ipv6() {
        assert_eq!(parse_host("::1").unwrap(), "::1");
    }

    #[test]
    fn test_parse_host_name() {
        assert_eq!(parse_host("example.com").unwrap(), "example.com");
        assert_eq!(parse_host("my-server").unwrap(), "my-server");
    }

    #[test]
    fn test_parse_host_rejects_garbage() {
        assert!(parse_host("").is_err());
        assert!(parse_host("-bad.example").is_err());
        assert!(parse_host("no spaces allowed").is_err());
    }

    #[test]
    fn test_parse_net() {
        let net = parse_net("192.168.1.0/24").unwrap();
        assert_eq!(host_count(&net), 256);
    }

    #[test]
    fn test_parse_net_single_host() {
        let net = parse_net("10.0.0.1/32").unwrap();
        assert_eq!(host_count(&net), 1);
    }

    #[test]
    fn test_parse_net_too_large() {
        assert!(matches!(
            parse_net("10.0.0.0/8"),
            Err(TargetError::NetworkTooLarge(_, _))
        ));
        assert!(matches!(
            parse_net("2001:db8::/32"),
            Err(TargetError::NetworkTooLarge(_, _))
        ));
    }

    #[test]
    fn test_parse_net_rejects_garbage() {
        assert!(parse_net("not-a-network/24").is_err());
        assert!(parse_net("192.168.1.0/33").is_err());
    }

    #[test]
    fn test_valid_hostname() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("sub.example.com"));
        assert!(is_valid_hostname("my-server"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("-invalid.com"));
    }
}
