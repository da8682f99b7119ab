//! Hostname resolution with IP-version preference

use crate::config::IpVersion;
use crate::error::{FtpError, Result};
use std::net::SocketAddr;
use tracing::trace;

/// Resolve `host:port` to the first endpoint matching the preference
pub(crate) async fn resolve(host: &str, port: u16, preference: IpVersion) -> Result<SocketAddr> {
    let addrs = tokio::net::lookup_host((host, port)).await?;

    let endpoint = addrs.into_iter().find(|addr| match preference {
        IpVersion::Any => true,
        IpVersion::V4 => addr.is_ipv4(),
        IpVersion::V6 => addr.is_ipv6(),
    });

    match endpoint {
        Some(addr) => {
            trace!("Resolved {}:{} to {}", host, port, addr);
            Ok(addr)
        }
        None => Err(FtpError::NoEndpoint(format!("{}:{}", host, port))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_loopback_v4() {
        let addr = resolve("127.0.0.1", 21, IpVersion::V4).await.unwrap();
        assert!(addr.is_ipv4());
        assert_eq!(addr.port(), 21);
    }

    #[tokio::test]
    async fn test_resolve_wrong_family_is_no_endpoint() {
        let err = resolve("127.0.0.1", 21, IpVersion::V6).await.unwrap_err();
        assert!(matches!(err, FtpError::NoEndpoint(_)));
    }
}
