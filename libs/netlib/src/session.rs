// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Ping loop: one echo attempt per interval until cancelled

use crate::cancel::CancelToken;
use crate::echo::{EchoOutcome, Transceiver};
use crate::error::NetResult;
use log::{debug, warn};
use std::io::Write;
use std::net::Ipv4Addr;
use std::time::Duration;

pub const TIMEOUT_MESSAGE: &str = "Request timed out.";

/// Settings fixed for the lifetime of a ping session.
#[derive(Debug, Clone)]
pub struct PingConfig {
    pub destination: Ipv4Addr,
    /// Echo identifier, shared by every request of the session.
    pub identifier: u16,
    pub timeout: Duration,
    pub interval: Duration,
    pub first_sequence: u16,
    pub verify_checksum: bool,
}

impl PingConfig {
    pub fn new(destination: Ipv4Addr) -> Self {
        Self {
            destination,
            identifier: (std::process::id() & 0xFFFF) as u16,
            timeout: Duration::from_secs(1),
            interval: Duration::from_secs(1),
            first_sequence: 1,
            verify_checksum: false,
        }
    }
}

/// A single echo attempt against the configured destination.
pub trait Probe {
    fn probe(&mut self, config: &PingConfig, sequence: u16, cancel: &CancelToken) -> NetResult<EchoOutcome>;
}

/// Opens a raw socket per attempt and releases it before returning.
pub struct RawProbe;

impl Probe for RawProbe {
    fn probe(&mut self, config: &PingConfig, sequence: u16, cancel: &CancelToken) -> NetResult<EchoOutcome> {
        Transceiver::open()?
            .verify_checksum(config.verify_checksum)
            .ping_once(config.destination, config.identifier, sequence, config.timeout, cancel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    ShutDown,
}

pub struct PingLoop<P> {
    config: PingConfig,
    probe: P,
    cancel: CancelToken,
    state: LoopState,
}

impl<P: Probe> PingLoop<P> {
    pub fn new(config: PingConfig, probe: P, cancel: CancelToken) -> Self {
        Self {
            config,
            probe,
            cancel,
            state: LoopState::Running,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until the cancel token trips, writing one line per attempt.
    /// Returns early only on a fatal error.
    pub fn run<W: Write>(&mut self, out: &mut W) -> NetResult<()> {
        let mut sequence = self.config.first_sequence;

        while self.state == LoopState::Running {
            if self.cancel.is_cancelled() {
                self.state = LoopState::ShutDown;
                break;
            }

            match self.probe.probe(&self.config, sequence, &self.cancel) {
                Ok(EchoOutcome::Reply(sample)) => {
                    debug!("seq={} ttl={} bytes={}", sample.sequence, sample.ttl, sample.bytes);
                    writeln!(out, "{}", sample.rtt_secs)?;
                }
                Ok(EchoOutcome::TimedOut) => writeln!(out, "{}", TIMEOUT_MESSAGE)?,
                Ok(EchoOutcome::Cancelled) => {
                    self.state = LoopState::ShutDown;
                    break;
                }
                Err(e) if e.is_transient() => {
                    warn!("seq={}: {}", sequence, e);
                    writeln!(out, "{}", TIMEOUT_MESSAGE)?;
                }
                Err(e) => return Err(e),
            }
            out.flush()?;

            sequence = sequence.wrapping_add(1);

            if self.cancel.sleep(self.config.interval) {
                self.state = LoopState::ShutDown;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echo::EchoSample;
    use crate::error::NetError;
    use std::collections::VecDeque;
    use std::io;

    struct ScriptedProbe {
        outcomes: VecDeque<NetResult<EchoOutcome>>,
        sequences: Vec<u16>,
    }

    impl ScriptedProbe {
        fn new(outcomes: Vec<NetResult<EchoOutcome>>) -> Self {
            Self {
                outcomes: outcomes.into(),
                sequences: Vec::new(),
            }
        }
    }

    impl Probe for ScriptedProbe {
        fn probe(&mut self, _: &PingConfig, sequence: u16, cancel: &CancelToken) -> NetResult<EchoOutcome> {
            self.sequences.push(sequence);
            let outcome = self.outcomes.pop_front().unwrap_or(Ok(EchoOutcome::Cancelled));
            if self.outcomes.is_empty() {
                cancel.cancel();
            }
            outcome
        }
    }

    fn reply(rtt_secs: f64) -> NetResult<EchoOutcome> {
        Ok(EchoOutcome::Reply(EchoSample { rtt_secs, sequence: 1, ttl: 64, bytes: 16 }))
    }

    fn config() -> PingConfig {
        let mut config = PingConfig::new(Ipv4Addr::LOCALHOST);
        config.interval = Duration::ZERO;
        config
    }

    fn run(probe: ScriptedProbe) -> (NetResult<()>, String, PingLoop<ScriptedProbe>) {
        let mut ping = PingLoop::new(config(), probe, CancelToken::new());
        let mut out = Vec::new();
        let result = ping.run(&mut out);
        (result, String::from_utf8(out).unwrap(), ping)
    }

    #[test]
    fn default_config() {
        let config = PingConfig::new(Ipv4Addr::LOCALHOST);
        assert_eq!(config.identifier, (std::process::id() & 0xFFFF) as u16);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.first_sequence, 1);
        assert!(!config.verify_checksum);
    }

    #[test]
    fn reports_each_attempt() {
        let probe = ScriptedProbe::new(vec![reply(0.25), Ok(EchoOutcome::TimedOut), reply(0.5)]);
        let (result, out, ping) = run(probe);
        assert!(result.is_ok());
        assert_eq!(out, "0.25\nRequest timed out.\n0.5\n");
        assert_eq!(ping.state(), LoopState::ShutDown);
    }

    #[test]
    fn sequence_advances_per_attempt() {
        let probe = ScriptedProbe::new((0..3).map(|_| Ok(EchoOutcome::TimedOut)).collect());
        let (_, _, ping) = run(probe);
        assert_eq!(ping.probe.sequences, vec![1, 2, 3]);
    }

    #[test]
    fn sequence_wraps() {
        let mut config = config();
        config.first_sequence = u16::MAX;
        let probe = ScriptedProbe::new((0..2).map(|_| Ok(EchoOutcome::TimedOut)).collect());
        let mut ping = PingLoop::new(config, probe, CancelToken::new());
        ping.run(&mut io::sink()).unwrap();
        assert_eq!(ping.probe.sequences, vec![u16::MAX, 0]);
    }

    #[test]
    fn cancelled_before_start_sends_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut ping = PingLoop::new(config(), ScriptedProbe::new(vec![reply(0.1)]), cancel);
        let mut out = Vec::new();
        ping.run(&mut out).unwrap();
        assert!(out.is_empty());
        assert!(ping.probe.sequences.is_empty());
        assert_eq!(ping.state(), LoopState::ShutDown);
    }

    #[test]
    fn cancelled_attempt_prints_nothing() {
        let probe = ScriptedProbe::new(vec![reply(0.1), Ok(EchoOutcome::Cancelled)]);
        let (result, out, _) = run(probe);
        assert!(result.is_ok());
        assert_eq!(out, "0.1\n");
    }

    #[test]
    fn transient_failure_keeps_looping() {
        let probe = ScriptedProbe::new(vec![
            Err(NetError::Send(io::Error::from(io::ErrorKind::Other))),
            Ok(EchoOutcome::TimedOut),
        ]);
        let (result, out, ping) = run(probe);
        assert!(result.is_ok());
        assert_eq!(out, "Request timed out.\nRequest timed out.\n");
        assert_eq!(ping.probe.sequences, vec![1, 2]);
    }

    #[test]
    fn unreachable_network_still_reports_every_attempt() {
        let unreachable = || -> NetResult<EchoOutcome> {
            Err(NetError::Send(io::Error::from_raw_os_error(libc::ENETUNREACH)))
        };
        let probe = ScriptedProbe::new((0..3).map(|_| unreachable()).collect());
        let (result, out, ping) = run(probe);
        assert!(result.is_ok());
        assert_eq!(ping.probe.sequences.len(), 3);
        assert_eq!(out.lines().count(), 3);
        assert!(out.lines().all(|line| line == TIMEOUT_MESSAGE));
    }

    #[test]
    fn socket_failure_is_fatal() {
        let probe = ScriptedProbe::new(vec![
            Err(NetError::Socket(io::Error::from(io::ErrorKind::PermissionDenied))),
            reply(0.1),
        ]);
        let (result, out, ping) = run(probe);
        assert!(matches!(result, Err(NetError::Socket(_))));
        assert!(out.is_empty());
        assert_eq!(ping.state(), LoopState::Running);
    }

    #[test]
    #[ignore = "needs CAP_NET_RAW and takes several seconds"]
    fn unroutable_host_times_out() {
        let mut config = PingConfig::new(Ipv4Addr::new(198, 51, 100, 254));
        config.interval = Duration::from_millis(100);
        let cancel = CancelToken::new();
        let stopper = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(2500));
            stopper.cancel();
        });

        let mut ping = PingLoop::new(config, RawProbe, cancel);
        let mut out = Vec::new();
        ping.run(&mut out).unwrap();
        handle.join().unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(!out.is_empty());
        assert!(out.lines().all(|line| line == TIMEOUT_MESSAGE));
    }

    #[test]
    #[ignore = "needs CAP_NET_RAW"]
    fn loopback_reports_rtt() {
        let mut config = PingConfig::new(Ipv4Addr::LOCALHOST);
        config.interval = Duration::from_millis(10);
        let cancel = CancelToken::new();
        let stopper = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            stopper.cancel();
        });

        let mut ping = PingLoop::new(config, RawProbe, cancel);
        let mut out = Vec::new();
        ping.run(&mut out).unwrap();
        handle.join().unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(!out.is_empty());
        for line in out.lines() {
            let rtt: f64 = line.parse().unwrap();
            assert!(rtt >= 0.0);
        }
    }
}
