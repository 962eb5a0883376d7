#![deny(missing_docs)]

//! An authenticated Diffie-Hellman key-exchange handshake protocol
//! between a listener and a connector peer.
//!
//! **dhshake** implements the classic modular-arithmetic DHKE over a
//! line-oriented TCP wire protocol. Each session generates fresh
//! parameters (a large probable prime and a small generator), exchanges
//! public values between the two roles, authenticates both directions
//! with a pre-shared-secret MAC, proves key agreement with
//! direction-bound confirmation tags, and finishes with a short
//! encrypted demonstration exchange under the derived session key.
//!
//! **dhshake** uses these building blocks:
//!
//! - Miller-Rabin probable-prime generation over arbitrary-precision
//!   integers (25 witness rounds for generated material, 10 for
//!   peer-supplied values)
//! - [BLAKE2b] for the keyed tag construction used by authentication
//!   and key derivation
//! - a length-preserving XOR stream transform for the post-handshake
//!   demonstration messages
//!
//! [BLAKE2b]: https://blake2.net/
//!
//! The MAC and cipher here preserve the protocol's *shape*, not
//! cryptographic strength. They sit behind the [`Mac`] and
//! [`SymmetricCipher`] traits so that vetted constructions can be
//! substituted without touching the handshake engine, but the defaults
//! must not be treated as security-grade.
//!
//! ## Design
//!
//! The two roles run symmetric but not identical message sequences over
//! a single persistent byte stream. Wire messages are newline-terminated
//! `TAG:value` lines; within one protocol step the receiver reads a
//! fixed count of lines and dispatches each by its tag, so field order
//! inside a step does not matter. Every handshake threads an explicit
//! [`HandshakeState`] value through its steps and terminates in
//! `Success` or `Failed`; failure is terminal and a fresh connection
//! with fresh parameters is required to try again.
//!
//! All I/O is blocking and synchronous. A configurable deadline bounds
//! every read and write on the stream; expiry surfaces as a transport
//! error instead of hanging the handshake.
//!
//! ## Basic Usage
//!
//! ```
//! use dhshake::{Connector, HandshakeConfig, Listener};
//! use std::net::{TcpListener, TcpStream};
//! use std::thread;
//!
//! let server = TcpListener::bind("127.0.0.1:0").expect("bind failed");
//! let addr = server.local_addr().expect("no local addr");
//!
//! // Listener accepts one connection, generates fresh parameters and
//! // drives its side of the handshake.
//! let listener_cfg = HandshakeConfig::new("alice", "bob", "our shared secret")
//!     .expect("bad config")
//!     .with_prime_bits(64);
//! let listener = thread::spawn(move || {
//!     let (stream, _) = server.accept().expect("accept failed");
//!     Listener::new(listener_cfg).run(stream)
//! });
//!
//! // Connector dials in, adopts the received parameters and completes
//! // the exchange, including the two encrypted demo round-trips.
//! let connector_cfg = HandshakeConfig::new("bob", "alice", "our shared secret")
//!     .expect("bad config");
//! let stream = TcpStream::connect(addr).expect("connect failed");
//! let ok = Connector::new(connector_cfg).run(stream);
//!
//! assert!(ok);
//! assert!(listener.join().expect("listener panicked"));
//! ```

pub mod auth;
pub mod cipher;
pub mod handshake;
pub mod keygen;
pub mod numeric;
pub mod participant;
pub mod wire;

/// Error types for every fallible operation in the crate.
///
/// The four kinds mirror the failure classes of the protocol:
/// `Validation` for malformed or out-of-range DH material,
/// `Authentication` for MAC and confirmation-tag mismatches,
/// `Protocol` for framing and identity violations, and `Transport`
/// for connection-level failures (refused, reset, resolution,
/// deadline expiry). The handshake entry points never let any of
/// these escape; they log the cause chain and report a boolean.
#[allow(missing_docs)]
pub mod errors {
    use error_chain::error_chain;

    error_chain! {
        foreign_links {
            Io(::std::io::Error);
        }

        errors {
            /// Malformed or out-of-range DH parameters, a failed
            /// primality check, or invalid hex.
            Validation(reason: String) {
                description("validation error")
                display("validation error: {}", reason)
            }
            /// MAC mismatch or confirmation-tag mismatch.
            Authentication(reason: String) {
                description("authentication error")
                display("authentication error: {}", reason)
            }
            /// Missing or unexpected tagged field, identity mismatch,
            /// or malformed message framing.
            Protocol(reason: String) {
                description("protocol error")
                display("protocol error: {}", reason)
            }
            /// Connection refused or reset, resolution failure, or an
            /// expired step deadline.
            Transport(reason: String) {
                description("transport error")
                display("transport error: {}", reason)
            }
        }
    }
}

pub use crate::auth::{
    derive_confirm_tag, derive_session_key, verify_tag, Blake2Mac, Mac, SessionKey, MAC_LEN,
};
pub use crate::cipher::{SymmetricCipher, XorCipher};
pub use crate::errors::{Error, ErrorKind, Result};
pub use crate::handshake::{Connector, HandshakeConfig, HandshakeState, Listener};
pub use crate::keygen::{
    generate_prime, sample_private_key, select_generator, validate_public_value, DhParams,
    DEFAULT_PRIME_BITS,
};
pub use crate::numeric::{is_probably_prime, modpow, MR_ROUNDS_GENERATE, MR_ROUNDS_PEER};
pub use crate::participant::{Participant, Role};
pub use crate::wire::{hex_decode, hex_encode, Tag, Wire};
