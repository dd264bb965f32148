//! Address resolution helpers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::trace;

use crate::error::{NetworkError, Result};

/// Resolve the address of a local network interface by name.
///
/// IPv4 addresses are preferred when the interface carries both
/// families.
pub fn network_iface_to_addr(iface_name: &str) -> Result<IpAddr> {
    let addrs = nix::ifaddrs::getifaddrs()
        .map_err(|errno| NetworkError::resolution(iface_name, errno.to_string()))?;

    let mut v6_fallback = None;

    for ifaddr in addrs {
        if ifaddr.interface_name != iface_name {
            continue;
        }
        let Some(storage) = ifaddr.address else {
            continue;
        };
        if let Some(sin) = storage.as_sockaddr_in() {
            return Ok(IpAddr::V4(sin.ip()));
        }
        if let Some(sin6) = storage.as_sockaddr_in6() {
            v6_fallback.get_or_insert(IpAddr::V6(sin6.ip()));
        }
    }

    v6_fallback.ok_or_else(|| {
        NetworkError::resolution(iface_name, "no such interface or no address assigned")
    })
}

/// For a string which might be a network interface name, an address
/// alias or an ip-addr string, figure out the ip address.
pub fn try_make_addr(iface_or_addr: &str) -> Result<IpAddr> {
    if iface_or_addr == "localhost" {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    if iface_or_addr == "ip6-localhost" {
        return Ok(IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    if let Ok(addr) = iface_or_addr.parse::<IpAddr>() {
        return Ok(addr);
    }

    // Here: then it might be a network iface.
    trace!(target = iface_or_addr, "not an address literal, trying interface lookup");
    network_iface_to_addr(iface_or_addr)
}
