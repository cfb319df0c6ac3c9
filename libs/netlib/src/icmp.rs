// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! ICMP echo packet implementation
//!
//! Echo or Echo Reply Message (RFC 792)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Type      |     Code      |          Checksum             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Identifier          |        Sequence Number        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Timestamp (f64 seconds since epoch)           |
//! +                                                               +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All multi-byte fields, the timestamp included, are in network byte order.

use crate::checksum::internet_checksum;
use crate::error::DecodeError;
use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_ECHO_REPLY: u8 = 0;

pub const ICMP_HEADER_LEN: usize = 8;
pub const TIMESTAMP_LEN: usize = 8;
pub const ECHO_PACKET_LEN: usize = ICMP_HEADER_LEN + TIMESTAMP_LEN;

/// Inbound datagrams are assumed to carry an option-less IPv4 header.
pub const IPV4_HEADER_LEN: usize = 20;
pub const MIN_DATAGRAM_LEN: usize = IPV4_HEADER_LEN + ICMP_HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub icmp_cksum: u16,
    pub icmp_id: u16,
    pub icmp_seq: u16,
}

impl IcmpHeader {
    fn to_bytes(self) -> [u8; ICMP_HEADER_LEN] {
        let mut buf = [0u8; ICMP_HEADER_LEN];
        buf[0] = self.icmp_type;
        buf[1] = self.icmp_code;
        buf[2..4].copy_from_slice(&self.icmp_cksum.to_be_bytes());
        buf[4..6].copy_from_slice(&self.icmp_id.to_be_bytes());
        buf[6..8].copy_from_slice(&self.icmp_seq.to_be_bytes());
        buf
    }

    fn from_bytes(data: &[u8; ICMP_HEADER_LEN]) -> Self {
        Self {
            icmp_type: data[0],
            icmp_code: data[1],
            icmp_cksum: u16::from_be_bytes([data[2], data[3]]),
            icmp_id: u16::from_be_bytes([data[4], data[5]]),
            icmp_seq: u16::from_be_bytes([data[6], data[7]]),
        }
    }
}

/// Seconds since the Unix epoch as carried in the echo payload.
pub fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// An outbound Echo Request carrying its send time as payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoRequest {
    pub identifier: u16,
    pub sequence: u16,
    pub timestamp: f64,
}

impl EchoRequest {
    /// Stamps a request with the current wall-clock time.
    pub fn now(identifier: u16, sequence: u16) -> Self {
        Self {
            identifier,
            sequence,
            timestamp: wall_clock_secs(),
        }
    }

    pub fn encode(&self) -> [u8; ECHO_PACKET_LEN] {
        let mut header = IcmpHeader {
            icmp_type: ICMP_ECHO_REQUEST,
            icmp_code: 0,
            icmp_cksum: 0,
            icmp_id: self.identifier,
            icmp_seq: self.sequence,
        };

        // The checksum covers its own field, so sum with it zeroed first
        let unsummed = self.assemble(header);
        header.icmp_cksum = internet_checksum(&unsummed);
        self.assemble(header)
    }

    fn assemble(&self, header: IcmpHeader) -> [u8; ECHO_PACKET_LEN] {
        let mut packet = [0u8; ECHO_PACKET_LEN];
        packet[..ICMP_HEADER_LEN].copy_from_slice(&header.to_bytes());
        packet[ICMP_HEADER_LEN..].copy_from_slice(&self.timestamp.to_be_bytes());
        packet
    }
}

/// Read-only view of an inbound IPv4 datagram carrying an ICMP message.
///
/// Decoding does not verify the ICMP checksum; callers that care ask
/// [`EchoReply::checksum_valid`].
#[derive(Debug, Clone, Copy)]
pub struct EchoReply<'a> {
    pub ip_header: &'a [u8; IPV4_HEADER_LEN],
    pub header: IcmpHeader,
    /// `None` when the message is too short to carry a timestamp.
    pub timestamp: Option<f64>,
    icmp: &'a [u8],
}

impl<'a> EchoReply<'a> {
    pub fn decode(datagram: &'a [u8]) -> Result<Self, DecodeError> {
        if datagram.len() < MIN_DATAGRAM_LEN {
            return Err(DecodeError::TooShort {
                len: datagram.len(),
                min: MIN_DATAGRAM_LEN,
            });
        }

        let (ip, icmp) = datagram.split_at(IPV4_HEADER_LEN);
        let ip_header: &[u8; IPV4_HEADER_LEN] = ip
            .try_into()
            .map_err(|_| DecodeError::TooShort { len: datagram.len(), min: MIN_DATAGRAM_LEN })?;

        let mut raw_header = [0u8; ICMP_HEADER_LEN];
        raw_header.copy_from_slice(&icmp[..ICMP_HEADER_LEN]);
        let header = IcmpHeader::from_bytes(&raw_header);

        let timestamp = icmp
            .get(ICMP_HEADER_LEN..ECHO_PACKET_LEN)
            .map(|bytes| {
                let mut raw = [0u8; TIMESTAMP_LEN];
                raw.copy_from_slice(bytes);
                f64::from_be_bytes(raw)
            });

        Ok(Self {
            ip_header,
            header,
            timestamp,
            icmp,
        })
    }

    pub fn is_echo_reply(&self) -> bool {
        self.header.icmp_type == ICMP_ECHO_REPLY
    }

    pub fn source(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.ip_header[12],
            self.ip_header[13],
            self.ip_header[14],
            self.ip_header[15],
        )
    }

    pub fn ttl(&self) -> u8 {
        self.ip_header[8]
    }

    /// Size of the ICMP message, header included.
    pub fn icmp_len(&self) -> usize {
        self.icmp.len()
    }

    pub fn checksum_valid(&self) -> bool {
        internet_checksum(self.icmp) == 0
    }
}
