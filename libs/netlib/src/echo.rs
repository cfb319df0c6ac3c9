// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Echo transceiver: one request out, the matching reply back

use crate::cancel::CancelToken;
use crate::error::NetResult;
use crate::icmp::{wall_clock_secs, EchoReply, EchoRequest};
use crate::raw::{IcmpSocket, Readiness};
use log::debug;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

pub const RECV_BUF_LEN: usize = 1024;

/// The datagram operations the transceiver needs from a socket.
pub trait EchoChannel {
    fn send_to(&self, buf: &[u8], dest: Ipv4Addr) -> NetResult<usize>;
    fn wait_readable(&self, timeout: Duration) -> NetResult<Readiness>;
    fn recv_from(&self, buf: &mut [u8]) -> NetResult<(usize, Ipv4Addr)>;
}

impl EchoChannel for IcmpSocket {
    fn send_to(&self, buf: &[u8], dest: Ipv4Addr) -> NetResult<usize> {
        IcmpSocket::send_to(self, buf, dest)
    }

    fn wait_readable(&self, timeout: Duration) -> NetResult<Readiness> {
        IcmpSocket::wait_readable(self, timeout)
    }

    fn recv_from(&self, buf: &mut [u8]) -> NetResult<(usize, Ipv4Addr)> {
        IcmpSocket::recv_from(self, buf)
    }
}

/// Correlation state for the single request in flight.
#[derive(Debug, Clone, Copy)]
pub struct PendingPing {
    pub identifier: u16,
    pub sequence: u16,
    pub destination: Ipv4Addr,
    pub deadline: Instant,
}

impl PendingPing {
    fn matches(&self, reply: &EchoReply<'_>, from: Ipv4Addr) -> bool {
        reply.is_echo_reply()
            && reply.header.icmp_id == self.identifier
            && reply.header.icmp_seq == self.sequence
            && from == self.destination
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoSample {
    /// Round-trip time in seconds, from the timestamp echoed in the payload.
    pub rtt_secs: f64,
    pub sequence: u16,
    pub ttl: u8,
    pub bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EchoOutcome {
    Reply(EchoSample),
    TimedOut,
    Cancelled,
}

pub struct Transceiver<C> {
    channel: C,
    verify_checksum: bool,
}

impl Transceiver<IcmpSocket> {
    /// Opens a fresh raw ICMP socket; it is closed when the transceiver
    /// is dropped.
    pub fn open() -> NetResult<Self> {
        Ok(Self::new(IcmpSocket::new()?))
    }
}

impl<C: EchoChannel> Transceiver<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            verify_checksum: false,
        }
    }

    /// Drop replies whose ICMP checksum does not verify.
    pub fn verify_checksum(mut self, enabled: bool) -> Self {
        self.verify_checksum = enabled;
        self
    }

    /// Sends one Echo Request and returns what is needed to recognise its
    /// reply. The deadline starts now.
    pub fn send(
        &self,
        destination: Ipv4Addr,
        identifier: u16,
        sequence: u16,
        timeout: Duration,
    ) -> NetResult<PendingPing> {
        let packet = EchoRequest::now(identifier, sequence).encode();
        self.channel.send_to(&packet, destination)?;
        debug!("sent echo request id={} seq={} to {}", identifier, sequence, destination);

        Ok(PendingPing {
            identifier,
            sequence,
            destination,
            deadline: Instant::now() + timeout,
        })
    }

    /// Waits for the reply to `pending` until its deadline. Every
    /// non-matching datagram re-arms the wait with whatever budget is left.
    pub fn receive_within(&self, pending: &PendingPing, cancel: &CancelToken) -> NetResult<EchoOutcome> {
        let mut buf = [0u8; RECV_BUF_LEN];

        loop {
            if cancel.is_cancelled() {
                return Ok(EchoOutcome::Cancelled);
            }

            let remaining = pending.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(EchoOutcome::TimedOut);
            }

            match self.channel.wait_readable(remaining)? {
                Readiness::Readable => {}
                Readiness::TimedOut => return Ok(EchoOutcome::TimedOut),
                Readiness::Interrupted => continue,
            }

            let (len, from) = self.channel.recv_from(&mut buf)?;
            let received_at = wall_clock_secs();

            let reply = match EchoReply::decode(&buf[..len]) {
                Ok(reply) => reply,
                Err(e) => {
                    debug!("ignoring datagram from {}: {}", from, e);
                    continue;
                }
            };

            if let Some(sample) = self.accept(pending, &reply, from, received_at) {
                return Ok(EchoOutcome::Reply(sample));
            }

            debug!(
                "ignoring icmp type={} id={} seq={} from {}",
                reply.header.icmp_type, reply.header.icmp_id, reply.header.icmp_seq, from
            );
        }
    }

    /// One full request/reply exchange.
    pub fn ping_once(
        &self,
        destination: Ipv4Addr,
        identifier: u16,
        sequence: u16,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> NetResult<EchoOutcome> {
        let pending = self.send(destination, identifier, sequence, timeout)?;
        self.receive_within(&pending, cancel)
    }

    fn accept(
        &self,
        pending: &PendingPing,
        reply: &EchoReply<'_>,
        from: Ipv4Addr,
        received_at: f64,
    ) -> Option<EchoSample> {
        if !pending.matches(reply, from) {
            return None;
        }

        if self.verify_checksum && !reply.checksum_valid() {
            debug!("dropping reply seq={} with bad checksum", reply.header.icmp_seq);
            return None;
        }

        let sent_at = reply.timestamp?;

        Some(EchoSample {
            // Clamp in case the wall clock stepped backwards mid-flight
            rtt_secs: (received_at - sent_at).max(0.0),
            sequence: reply.header.icmp_seq,
            ttl: reply.ttl(),
            bytes: reply.icmp_len(),
        })
    }
}
