// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! netlib - ICMP echo library for Rustica
//!
//! Provides the Internet checksum, the ICMP echo codec, a raw socket,
//! the echo transceiver, and the ping loop built on top of them.

pub mod cancel;
pub mod checksum;
pub mod echo;
pub mod error;
pub mod icmp;
pub mod raw;
pub mod resolve;
pub mod session;

pub use cancel::CancelToken;
pub use checksum::internet_checksum;
pub use echo::{EchoChannel, EchoOutcome, EchoSample, PendingPing, Transceiver};
pub use error::{DecodeError, NetError, NetResult};
pub use icmp::{EchoReply, EchoRequest, IcmpHeader, ICMP_ECHO_REPLY, ICMP_ECHO_REQUEST};
pub use raw::{IcmpSocket, RawSocket, Readiness};
pub use resolve::resolve_ipv4;
pub use session::{LoopState, PingConfig, PingLoop, Probe, RawProbe, TIMEOUT_MESSAGE};
