// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Host name resolution

use crate::error::{NetError, NetResult};
use log::debug;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};

/// Resolves `host` to its first IPv4 address. Dotted-quad literals are
/// returned without a lookup.
pub fn resolve_ipv4(host: &str) -> NetResult<Ipv4Addr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }

    let addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|e| {
            debug!("lookup of {} failed: {}", host, e);
            NetError::Resolve { host: host.to_string() }
        })?;

    addrs
        .filter_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| NetError::Resolve { host: host.to_string() })
}
