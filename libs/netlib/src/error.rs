// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Error types

use std::io;
use thiserror::Error;

/// Reasons an inbound datagram cannot be read as an ICMP echo message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("datagram too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },
}

#[derive(Debug, Error)]
pub enum NetError {
    #[error("failed to create raw socket (may require CAP_NET_RAW): {0}")]
    Socket(#[source] io::Error),

    #[error("sendto failed: {0}")]
    Send(#[source] io::Error),

    #[error("recvfrom failed: {0}")]
    Recv(#[source] io::Error),

    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),

    #[error("hostname lookup failed: {host}")]
    Resolve { host: String },

    #[error("failed to write report: {0}")]
    Output(#[from] io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl NetError {
    /// Transient errors affect a single echo attempt only; the loop
    /// reports them and moves on to the next attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NetError::Send(_) | NetError::Recv(_) | NetError::Poll(_) | NetError::Decode(_)
        )
    }
}

pub type NetResult<T> = Result<T, NetError>;
