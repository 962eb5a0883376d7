//! Command-line surface for the handshake: one process per role, exit
//! status taken from the handshake outcome.

use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, LevelFilter};

use dhshake::{Connector, HandshakeConfig, Listener};

/// Authenticated Diffie-Hellman key exchange between two peers.
#[derive(Parser)]
#[command(name = "dhshake", version, about, long_about = None)]
struct Cli {
    /// Verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Prime bit length used by the parameter-generating side
    #[arg(long, default_value_t = 512)]
    bits: u64,

    /// Deadline in seconds for each blocking network step (0 disables)
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept one inbound handshake
    Listen {
        /// Own identity
        name: String,
        /// Identity the peer must present
        expected_peer: String,
        /// Port to listen on
        port: u16,
        /// Pre-shared authentication secret
        auth_secret: String,
    },
    /// Initiate a handshake with a remote listener
    Connect {
        /// Own identity
        name: String,
        /// Identity the peer must present
        expected_peer: String,
        /// Local listening port (kept for surface symmetry with
        /// `listen`; the connector role does not bind it)
        listen_port: u16,
        /// Remote listener host
        peer_host: String,
        /// Remote listener port
        peer_port: u16,
        /// Pre-shared authentication secret
        auth_secret: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let timeout = match cli.timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    let ok = match cli.command {
        Commands::Listen {
            name,
            expected_peer,
            port,
            auth_secret,
        } => match HandshakeConfig::new(&name, &expected_peer, &auth_secret) {
            Ok(cfg) => {
                let cfg = cfg.with_prime_bits(cli.bits).with_step_timeout(timeout);
                Listener::new(cfg).listen(port)
            }
            Err(e) => {
                error!("invalid configuration: {}", e);
                false
            }
        },
        Commands::Connect {
            name,
            expected_peer,
            listen_port: _,
            peer_host,
            peer_port,
            auth_secret,
        } => match HandshakeConfig::new(&name, &expected_peer, &auth_secret) {
            Ok(cfg) => {
                let cfg = cfg.with_prime_bits(cli.bits).with_step_timeout(timeout);
                Connector::new(cfg).connect(&peer_host, peer_port)
            }
            Err(e) => {
                error!("invalid configuration: {}", e);
                false
            }
        },
    };

    process::exit(if ok { 0 } else { 1 });
}
