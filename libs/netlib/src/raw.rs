// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Raw socket implementation

use crate::error::{NetError, NetResult};
use std::io;
use std::mem::size_of;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Result of waiting for a socket to become readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Readable,
    TimedOut,
    /// The wait was cut short by a signal.
    Interrupted,
}

/// An IPv4 raw socket. The descriptor is closed on drop.
pub struct RawSocket {
    fd: libc::c_int,
}

impl RawSocket {
    pub fn new(protocol: i32) -> NetResult<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_INET,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                protocol,
            )
        };

        if fd < 0 {
            return Err(NetError::Socket(io::Error::last_os_error()));
        }

        Ok(Self { fd })
    }

    pub fn send_to(&self, buf: &[u8], dest: Ipv4Addr) -> NetResult<usize> {
        // Raw ICMP has no ports; the kernel ignores sin_port
        let sockaddr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: 0,
            sin_addr: libc::in_addr {
                s_addr: u32::from_ne_bytes(dest.octets()),
            },
            sin_zero: [0; 8],
        };

        let sent = unsafe {
            libc::sendto(
                self.fd,
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                0,
                &sockaddr as *const _ as *const libc::sockaddr,
                size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };

        if sent < 0 {
            return Err(NetError::Send(io::Error::last_os_error()));
        }

        Ok(sent as usize)
    }

    pub fn recv_from(&self, buf: &mut [u8]) -> NetResult<(usize, Ipv4Addr)> {
        let mut sockaddr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        let mut addr_len = size_of::<libc::sockaddr_in>() as libc::socklen_t;

        let recv_len = unsafe {
            libc::recvfrom(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                &mut sockaddr as *mut _ as *mut libc::sockaddr,
                &mut addr_len,
            )
        };

        if recv_len < 0 {
            return Err(NetError::Recv(io::Error::last_os_error()));
        }

        let from = Ipv4Addr::from(sockaddr.sin_addr.s_addr.to_ne_bytes());
        Ok((recv_len as usize, from))
    }

    /// Blocks until the socket is readable, `timeout` elapses, or a signal
    /// arrives.
    pub fn wait_readable(&self, timeout: Duration) -> NetResult<Readiness> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };

        let ready = unsafe { libc::poll(&mut pfd, 1, poll_millis(timeout)) };

        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Readiness::Interrupted);
            }
            return Err(NetError::Poll(err));
        }

        if ready == 0 {
            Ok(Readiness::TimedOut)
        } else {
            Ok(Readiness::Readable)
        }
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Rounds up so a sub-millisecond budget still blocks instead of spinning.
fn poll_millis(timeout: Duration) -> libc::c_int {
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    millis.min(libc::c_int::MAX as u128) as libc::c_int
}

pub struct IcmpSocket {
    raw: RawSocket,
}

impl IcmpSocket {
    pub fn new() -> NetResult<Self> {
        Ok(Self {
            raw: RawSocket::new(libc::IPPROTO_ICMP)?,
        })
    }

    pub fn send_to(&self, buf: &[u8], dest: Ipv4Addr) -> NetResult<usize> {
        self.raw.send_to(buf, dest)
    }

    pub fn recv_from(&self, buf: &mut [u8]) -> NetResult<(usize, Ipv4Addr)> {
        self.raw.recv_from(buf)
    }

    pub fn wait_readable(&self, timeout: Duration) -> NetResult<Readiness> {
        self.raw.wait_readable(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_timeout_rounds_up() {
        assert_eq!(poll_millis(Duration::ZERO), 0);
        assert_eq!(poll_millis(Duration::from_micros(1)), 1);
        assert_eq!(poll_millis(Duration::from_millis(1000)), 1000);
        assert_eq!(poll_millis(Duration::from_micros(1500)), 2);
        assert_eq!(poll_millis(Duration::from_secs(u64::MAX)), libc::c_int::MAX);
    }

    #[test]
    #[ignore = "needs CAP_NET_RAW"]
    fn idle_socket_times_out() {
        let socket = IcmpSocket::new().unwrap();
        // Loopback traffic from other tests may wake us; only a hard error fails
        let readiness = socket.wait_readable(Duration::from_millis(50)).unwrap();
        assert_ne!(readiness, Readiness::Interrupted);
    }
}
