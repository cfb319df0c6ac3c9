// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! ping - Send ICMP echo requests once per second until interrupted

use anyhow::{anyhow, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use log::debug;
use netlib::{resolve_ipv4, CancelToken, NetError, PingConfig, PingLoop, Probe, RawProbe};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::process::exit;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Incorrect number of arguments provided!\n\
                     Usage: ping <host>\n\
                     N.B: May require admin/sudo privileges.";

const EXIT_USAGE: i32 = 1;
const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 2;

/// Tripped by the SIGINT handler.
static INTERRUPT: OnceLock<CancelToken> = OnceLock::new();

/// Ping utility
#[derive(Parser, Debug)]
#[command(name = "ping", version)]
#[command(about = "Send ICMP ECHO_REQUEST to a network host", long_about = None)]
struct Args {
    /// Host name or IPv4 address to ping
    host: String,
}

fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(_) => {
            println!("{}", USAGE);
            exit(EXIT_USAGE);
        }
    };

    init_logging();

    // Installed first so an interrupt during a slow lookup still exits cleanly
    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel)?;

    if let Err(e) = ping_host(&args.host, RawProbe, cancel, &mut io::stdout().lock()) {
        eprintln!("ping: {} - error: {:#}", args.host, e);
        if matches!(e.downcast_ref::<NetError>(), Some(NetError::Socket(_))) {
            eprintln!("Note: ICMP sockets require CAP_NET_RAW capability or root privileges");
        }
        exit(EXIT_FAILURE);
    }

    println!("Received interrupt, shutting down...");
    exit(EXIT_INTERRUPTED);
}

fn banner(destination: Ipv4Addr) -> String {
    format!("Pinging {} using Python:", destination)
}

/// Resolves `host` and pings it until `cancel` trips. Returns `Ok` only on
/// an orderly shutdown.
fn ping_host<P: Probe, W: Write>(host: &str, probe: P, cancel: CancelToken, out: &mut W) -> Result<()> {
    let destination = resolve_ipv4(host).with_context(|| format!("cannot resolve {}", host))?;

    let config = PingConfig::new(destination);
    debug!("identifier {:#06x}, timeout {:?}", config.identifier, config.timeout);

    writeln!(out, "{}", banner(destination))?;
    writeln!(out)?;

    PingLoop::new(config, probe, cancel).run(out)?;
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

extern "C" fn on_interrupt(_: libc::c_int) {
    if let Some(token) = INTERRUPT.get() {
        token.cancel();
    }
}

fn install_interrupt_handler(token: &CancelToken) -> Result<()> {
    INTERRUPT
        .set(token.clone())
        .map_err(|_| anyhow!("interrupt handler already installed"))?;

    // No SA_RESTART: a blocked poll must return EINTR so the wait sees the token
    let action = SigAction::new(SigHandler::Handler(on_interrupt), SaFlags::empty(), SigSet::empty());
    unsafe { sigaction(Signal::SIGINT, &action) }.context("failed to install SIGINT handler")?;

    Ok(())
}
