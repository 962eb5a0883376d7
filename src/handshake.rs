//! The handshake protocol engine.
//!
//! Two roles, two symmetric but not identical message sequences, one
//! persistent bidirectional stream per session. The listener generates
//! the session parameters and speaks first; the connector adopts them
//! after validation. Both directions are authenticated with a MAC
//! under the pre-shared secret, key agreement is proved with
//! direction-bound confirmation tags, and the session closes with two
//! encrypted demonstration round-trips.
//!
//! Every failure is logged with its cause chain and collapses to a
//! boolean at the public entry points; no key material leaves the
//! engine unless the exchange reaches its confirmed state.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, error, info};
use num_bigint::BigUint;

use crate::auth::{derive_confirm_tag, derive_session_key, verify_tag, Blake2Mac, Mac, SessionKey};
use crate::cipher::{SymmetricCipher, XorCipher};
use crate::errors::{Error, ErrorKind, Result, ResultExt};
use crate::keygen::{validate_public_value, DhParams, DEFAULT_PRIME_BITS};
use crate::numeric::MR_ROUNDS_PEER;
use crate::participant::{Participant, Role};
use crate::wire::{hex_decode, hex_encode, Tag, Wire};
use error_chain::{bail, ensure};

/// Demo round-trips exchanged after confirmation.
const DEMO_ROUND_TRIPS: usize = 2;

/// Per-handshake configuration shared by both roles.
#[derive(Clone)]
pub struct HandshakeConfig {
    name: String,
    expected_peer: String,
    auth_secret: String,
    prime_bits: u64,
    step_timeout: Option<Duration>,
}

impl HandshakeConfig {
    /// Default deadline applied to every blocking read and write on
    /// the stream.
    pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

    /// Builds a configuration for one handshake attempt.
    ///
    /// Identities appear inside canonical MAC payloads and wire lines,
    /// so they must be non-empty and free of `|`, `:` and line breaks.
    /// The authentication secret must be non-empty.
    pub fn new(name: &str, expected_peer: &str, auth_secret: &str) -> Result<HandshakeConfig> {
        check_identity("own identity", name)?;
        check_identity("expected peer identity", expected_peer)?;
        ensure!(
            !auth_secret.is_empty(),
            ErrorKind::Validation("authentication secret must not be empty".into())
        );
        Ok(HandshakeConfig {
            name: name.to_owned(),
            expected_peer: expected_peer.to_owned(),
            auth_secret: auth_secret.to_owned(),
            prime_bits: DEFAULT_PRIME_BITS,
            step_timeout: Some(HandshakeConfig::DEFAULT_STEP_TIMEOUT),
        })
    }

    /// Sets the prime bit length used when this side generates the
    /// session parameters. The connector never generates parameters,
    /// so the value only matters for the listener role.
    pub fn with_prime_bits(mut self, bits: u64) -> HandshakeConfig {
        self.prime_bits = bits;
        self
    }

    /// Sets the per-step deadline. `None` removes the deadline and
    /// lets reads and writes block indefinitely.
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> HandshakeConfig {
        self.step_timeout = timeout;
        self
    }
}

impl ::std::fmt::Debug for HandshakeConfig {
    // Keeps the authentication secret out of debug output.
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        f.debug_struct("HandshakeConfig")
            .field("name", &self.name)
            .field("expected_peer", &self.expected_peer)
            .field("prime_bits", &self.prime_bits)
            .field("step_timeout", &self.step_timeout)
            .finish()
    }
}

fn check_identity(what: &str, value: &str) -> Result<()> {
    ensure!(
        !value.is_empty(),
        ErrorKind::Validation(format!("{} must not be empty", what))
    );
    ensure!(
        !value.contains(&['|', ':', '\n', '\r'][..]),
        ErrorKind::Validation(format!(
            "{} {:?} contains a reserved character",
            what, value
        ))
    );
    Ok(())
}

/// The linear progression of one handshake.
///
/// Failure is terminal and non-resumable; a failed exchange requires a
/// fresh connection and fresh parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No messages exchanged yet.
    Idle,
    /// The first flight (parameters and public value) has been sent or
    /// received.
    ParamsExchanged,
    /// Both public values are known locally.
    KeysExchanged,
    /// The peer's identity and MAC checked out.
    Authenticated,
    /// The peer proved it derived the same shared secret.
    Confirmed,
    /// Session key derived; demo exchange in progress.
    SessionActive,
    /// Handshake and demo exchange completed.
    Success,
    /// Terminal failure.
    Failed,
}

impl HandshakeState {
    /// Advances to the successor state.
    ///
    /// Transitions are strictly linear; there is no transition out of
    /// `Success` or `Failed`.
    pub fn advance(self) -> Result<HandshakeState> {
        use HandshakeState::*;
        let next = match self {
            Idle => ParamsExchanged,
            ParamsExchanged => KeysExchanged,
            KeysExchanged => Authenticated,
            Authenticated => Confirmed,
            Confirmed => SessionActive,
            SessionActive => Success,
            Success | Failed => bail!(ErrorKind::Protocol(format!(
                "no transition out of {:?}",
                self
            ))),
        };
        debug!("handshake state {:?} -> {:?}", self, next);
        Ok(next)
    }
}

// The connector's claims as received in the listener's four-line
// window. Untrusted until validated; values stay in wire form because
// parsing is itself a validation step.
struct ConnectorAssertion {
    id: String,
    public_value: String,
    mac: String,
    confirm: String,
}

impl ConnectorAssertion {
    fn from_fields(mut fields: HashMap<Tag, String>) -> Result<ConnectorAssertion> {
        Ok(ConnectorAssertion {
            mac: take(&mut fields, Tag::Mac)?,
            id: take(&mut fields, Tag::Id)?,
            public_value: take(&mut fields, Tag::Pub)?,
            confirm: take(&mut fields, Tag::Confirm)?,
        })
    }
}

// The listener's claims as received in the connector's five-line
// window.
struct ListenerAssertion {
    id: String,
    prime: String,
    generator: String,
    public_value: String,
    mac: String,
}

impl ListenerAssertion {
    fn from_fields(mut fields: HashMap<Tag, String>) -> Result<ListenerAssertion> {
        Ok(ListenerAssertion {
            mac: take(&mut fields, Tag::Mac)?,
            id: take(&mut fields, Tag::Id)?,
            prime: take(&mut fields, Tag::P)?,
            generator: take(&mut fields, Tag::G)?,
            public_value: take(&mut fields, Tag::Pub)?,
        })
    }
}

fn take(fields: &mut HashMap<Tag, String>, tag: Tag) -> Result<String> {
    fields
        .remove(&tag)
        .ok_or_else(|| Error::from(ErrorKind::Protocol(format!("missing {} field", tag))))
}

// Canonical MAC payload for the key-exchange flights:
// p|g|public|ROLE|sender|expected_receiver, all in wire form.
fn exchange_payload(
    p: &str,
    g: &str,
    public_value: &str,
    role: Role,
    self_id: &str,
    peer_id: &str,
) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}",
        p,
        g,
        public_value,
        role.as_str(),
        self_id,
        peer_id
    )
}

// Recomputes the exchange MAC over the peer's claimed payload and
// compares in constant time.
fn check_exchange_mac(
    mac: &dyn Mac,
    auth_secret: &str,
    expected_payload: &str,
    received_hex: &str,
) -> Result<()> {
    let expected = mac.tag(auth_secret.as_bytes(), expected_payload.as_bytes());
    let received = hex_decode(received_hex)?;
    ensure!(
        verify_tag(&expected, &received),
        ErrorKind::Authentication("exchange MAC mismatch".into())
    );
    Ok(())
}

fn parse_decimal(value: &str, tag: Tag) -> Result<BigUint> {
    value
        .parse::<BigUint>()
        .chain_err(|| ErrorKind::Validation(format!("{} value {:?} is not decimal", tag, value)))
}

// Applies the configured deadlines and wraps the stream for framing.
fn prepare(
    cfg: &HandshakeConfig,
    stream: TcpStream,
) -> Result<Wire<BufReader<TcpStream>, TcpStream>> {
    stream
        .set_read_timeout(cfg.step_timeout)
        .chain_err(|| ErrorKind::Transport("set read deadline".into()))?;
    stream
        .set_write_timeout(cfg.step_timeout)
        .chain_err(|| ErrorKind::Transport("set write deadline".into()))?;
    Wire::from_tcp(stream)
}

// Collapses an error chain into log output; the public surface of the
// engine reports only success or failure.
fn log_failure(role: Role, err: &Error) {
    error!("{} handshake failed: {}", role.as_str(), err);
    for cause in err.iter().skip(1) {
        error!("  caused by: {}", cause);
    }
    debug!("handshake state {:?} is terminal", HandshakeState::Failed);
}

fn send_encrypted<R: BufRead, W: Write>(
    wire: &mut Wire<R, W>,
    cipher: &dyn SymmetricCipher,
    key: &SessionKey,
    message: &str,
) -> Result<()> {
    let ciphertext = cipher.apply(message.as_bytes(), key.as_bytes())?;
    wire.send(Tag::Enc, &hex_encode(&ciphertext))
}

fn recv_encrypted<R: BufRead, W: Write>(
    wire: &mut Wire<R, W>,
    cipher: &dyn SymmetricCipher,
    key: &SessionKey,
) -> Result<String> {
    let (tag, value) = wire.recv()?;
    ensure!(
        tag == Tag::Enc,
        ErrorKind::Protocol(format!("expected ENC, got {}", tag))
    );
    let ciphertext = hex_decode(&value)?;
    let plaintext = cipher.apply(&ciphertext, key.as_bytes())?;
    Ok(String::from_utf8_lossy(&plaintext).into_owned())
}

/// The accepting side of the exchange.
///
/// Generates fresh session parameters, speaks the first flight and
/// leads the demo exchange.
pub struct Listener {
    cfg: HandshakeConfig,
    mac: Box<dyn Mac>,
    cipher: Box<dyn SymmetricCipher>,
}

impl Listener {
    /// Creates a listener with the default primitives.
    pub fn new(cfg: HandshakeConfig) -> Listener {
        Listener {
            cfg,
            mac: Box::new(Blake2Mac),
            cipher: Box::new(XorCipher),
        }
    }

    /// Creates a listener with substituted MAC and cipher primitives.
    pub fn with_primitives(
        cfg: HandshakeConfig,
        mac: Box<dyn Mac>,
        cipher: Box<dyn SymmetricCipher>,
    ) -> Listener {
        Listener { cfg, mac, cipher }
    }

    /// Binds `port`, accepts one inbound connection (blocking) and
    /// runs the handshake on it.
    ///
    /// Returns `true` only if the full exchange, including the demo
    /// round-trips, succeeded.
    pub fn listen(&self, port: u16) -> bool {
        match self.accept_one(port) {
            Ok(stream) => self.run(stream),
            Err(e) => {
                log_failure(Role::Listener, &e);
                false
            }
        }
    }

    fn accept_one(&self, port: u16) -> Result<TcpStream> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .chain_err(|| ErrorKind::Transport(format!("bind port {}", port)))?;
        info!("{} listening on port {}", self.cfg.name, port);
        let (stream, peer) = listener
            .accept()
            .chain_err(|| ErrorKind::Transport("accept inbound connection".into()))?;
        info!("accepted connection from {}", peer);
        Ok(stream)
    }

    /// Runs the listener side over an already-established stream.
    pub fn run(&self, stream: TcpStream) -> bool {
        let outcome =
            prepare(&self.cfg, stream).and_then(|mut wire| self.exchange(&mut wire));
        match outcome {
            Ok(()) => true,
            Err(e) => {
                log_failure(Role::Listener, &e);
                false
            }
        }
    }

    fn exchange<R: BufRead, W: Write>(&self, wire: &mut Wire<R, W>) -> Result<()> {
        let cfg = &self.cfg;
        let mut state = HandshakeState::Idle;

        // Fresh parameters and key pair for this session.
        let params = DhParams::generate(cfg.prime_bits)?;
        let me = Participant::generate(&cfg.name, Role::Listener, params.clone())?;
        let p_str = params.p.to_string();
        let g_str = params.g.to_string();
        let pub_str = me.public_value().to_string();

        // First flight: identity, parameters, public value, and the
        // MAC binding all of them to the pre-shared secret.
        let payload = exchange_payload(
            &p_str,
            &g_str,
            &pub_str,
            Role::Listener,
            &cfg.name,
            &cfg.expected_peer,
        );
        let mac = self.mac.tag(cfg.auth_secret.as_bytes(), payload.as_bytes());
        wire.send(Tag::Id, &cfg.name)?;
        wire.send(Tag::P, &p_str)?;
        wire.send(Tag::G, &g_str)?;
        wire.send(Tag::Pub, &pub_str)?;
        wire.send(Tag::Mac, &hex_encode(&mac))?;
        state = state.advance()?;

        // The connector's reply window: four fields, any order.
        let fields = wire.recv_step(&[Tag::Pub, Tag::Mac, Tag::Id, Tag::Confirm])?;
        let peer = ConnectorAssertion::from_fields(fields)?;
        state = state.advance()?;

        // Ordered validation: identity, MAC, then parameter sanity.
        // The first violation aborts the exchange.
        ensure!(
            peer.id == cfg.expected_peer,
            ErrorKind::Protocol(format!(
                "peer identified as {:?}, expected {:?}",
                peer.id, cfg.expected_peer
            ))
        );
        let expected_payload = exchange_payload(
            &p_str,
            &g_str,
            &peer.public_value,
            Role::Connector,
            &peer.id,
            &cfg.name,
        );
        check_exchange_mac(&*self.mac, &cfg.auth_secret, &expected_payload, &peer.mac)?;
        let peer_public = parse_decimal(&peer.public_value, Tag::Pub)?;
        validate_public_value(&peer_public, &params.p)?;
        state = state.advance()?;

        // Key agreement, and the peer's proof of it. The expected tag
        // is recomputed locally with the directions swapped.
        let shared = me.shared_secret(&peer_public)?;
        let expected_confirm =
            derive_confirm_tag(&*self.mac, &shared, Role::Connector, &peer.id, &cfg.name);
        let received_confirm = hex_decode(&peer.confirm)?;
        ensure!(
            verify_tag(&expected_confirm, &received_confirm),
            ErrorKind::Authentication(format!("confirmation tag mismatch from {}", peer.id))
        );
        state = state.advance()?;

        // Prove our own derivation and open the session.
        let own_confirm =
            derive_confirm_tag(&*self.mac, &shared, Role::Listener, &cfg.name, &peer.id);
        wire.send(Tag::Confirm, &hex_encode(&own_confirm))?;
        let key = derive_session_key(&*self.mac, &shared);
        state = state.advance()?;
        info!("{} authenticated {}; session established", cfg.name, peer.id);

        for round in 1..=DEMO_ROUND_TRIPS {
            let message = format!(
                "{} to {}: session check {}/{}",
                cfg.name, peer.id, round, DEMO_ROUND_TRIPS
            );
            send_encrypted(wire, &*self.cipher, &key, &message)?;
            let reply = recv_encrypted(wire, &*self.cipher, &key)?;
            info!("{} received reply: {}", cfg.name, reply);
        }
        state = state.advance()?;
        info!("{} handshake finished in state {:?}", cfg.name, state);
        Ok(())
    }
}

/// The initiating side of the exchange.
///
/// Connects to a listener, adopts the received parameters after
/// validation and answers the demo exchange.
pub struct Connector {
    cfg: HandshakeConfig,
    mac: Box<dyn Mac>,
    cipher: Box<dyn SymmetricCipher>,
}

impl Connector {
    /// Creates a connector with the default primitives.
    pub fn new(cfg: HandshakeConfig) -> Connector {
        Connector {
            cfg,
            mac: Box::new(Blake2Mac),
            cipher: Box::new(XorCipher),
        }
    }

    /// Creates a connector with substituted MAC and cipher primitives.
    pub fn with_primitives(
        cfg: HandshakeConfig,
        mac: Box<dyn Mac>,
        cipher: Box<dyn SymmetricCipher>,
    ) -> Connector {
        Connector { cfg, mac, cipher }
    }

    /// Resolves `host:port`, connects and runs the handshake.
    ///
    /// Returns `true` only if the full exchange, including the demo
    /// round-trips, succeeded.
    pub fn connect(&self, host: &str, port: u16) -> bool {
        match self.open(host, port) {
            Ok(stream) => self.run(stream),
            Err(e) => {
                log_failure(Role::Connector, &e);
                false
            }
        }
    }

    fn open(&self, host: &str, port: u16) -> Result<TcpStream> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .chain_err(|| ErrorKind::Transport(format!("resolve {}:{}", host, port)))?
            .collect();
        let mut last = None;
        for addr in &addrs {
            let attempt = match self.cfg.step_timeout {
                Some(deadline) => TcpStream::connect_timeout(addr, deadline),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    info!("connected to {}", addr);
                    return Ok(stream);
                }
                Err(e) => last = Some(e),
            }
        }
        match last {
            Some(e) => Err(Error::with_chain(
                e,
                ErrorKind::Transport(format!("connect to {}:{}", host, port)),
            )),
            None => bail!(ErrorKind::Transport(format!(
                "{}:{} resolved to no addresses",
                host, port
            ))),
        }
    }

    /// Runs the connector side over an already-established stream.
    pub fn run(&self, stream: TcpStream) -> bool {
        let outcome =
            prepare(&self.cfg, stream).and_then(|mut wire| self.exchange(&mut wire));
        match outcome {
            Ok(()) => true,
            Err(e) => {
                log_failure(Role::Connector, &e);
                false
            }
        }
    }

    fn exchange<R: BufRead, W: Write>(&self, wire: &mut Wire<R, W>) -> Result<()> {
        let cfg = &self.cfg;
        let mut state = HandshakeState::Idle;

        // The listener speaks first: five fields, any order.
        let fields = wire.recv_step(&[Tag::P, Tag::G, Tag::Pub, Tag::Mac, Tag::Id])?;
        let peer = ListenerAssertion::from_fields(fields)?;
        state = state.advance()?;

        // Ordered validation, mirroring the listener's checks. The
        // received prime gets a fresh (10-round) primality test.
        ensure!(
            peer.id == cfg.expected_peer,
            ErrorKind::Protocol(format!(
                "peer identified as {:?}, expected {:?}",
                peer.id, cfg.expected_peer
            ))
        );
        let expected_payload = exchange_payload(
            &peer.prime,
            &peer.generator,
            &peer.public_value,
            Role::Listener,
            &peer.id,
            &cfg.name,
        );
        check_exchange_mac(&*self.mac, &cfg.auth_secret, &expected_payload, &peer.mac)?;
        let p = parse_decimal(&peer.prime, Tag::P)?;
        let g = parse_decimal(&peer.generator, Tag::G)?;
        let peer_public = parse_decimal(&peer.public_value, Tag::Pub)?;
        let params = DhParams { p, g };
        params.validate(MR_ROUNDS_PEER)?;
        validate_public_value(&peer_public, &params.p)?;

        // Own key pair against the received parameters.
        let me = Participant::generate(&cfg.name, Role::Connector, params)?;
        let shared = me.shared_secret(&peer_public)?;
        state = state.advance()?;

        // Reply flight: identity, public value and our MAC over them.
        let pub_str = me.public_value().to_string();
        let payload = exchange_payload(
            &peer.prime,
            &peer.generator,
            &pub_str,
            Role::Connector,
            &cfg.name,
            &cfg.expected_peer,
        );
        let mac = self.mac.tag(cfg.auth_secret.as_bytes(), payload.as_bytes());
        wire.send(Tag::Id, &cfg.name)?;
        wire.send(Tag::Pub, &pub_str)?;
        wire.send(Tag::Mac, &hex_encode(&mac))?;
        state = state.advance()?;

        // Our confirmation tag goes out before the listener's arrives.
        let own_confirm =
            derive_confirm_tag(&*self.mac, &shared, Role::Connector, &cfg.name, &peer.id);
        wire.send(Tag::Confirm, &hex_encode(&own_confirm))?;

        let (tag, value) = wire.recv()?;
        ensure!(
            tag == Tag::Confirm,
            ErrorKind::Protocol(format!("expected CONFIRM, got {}", tag))
        );
        let expected_confirm =
            derive_confirm_tag(&*self.mac, &shared, Role::Listener, &peer.id, &cfg.name);
        let received_confirm = hex_decode(&value)?;
        ensure!(
            verify_tag(&expected_confirm, &received_confirm),
            ErrorKind::Authentication(format!("confirmation tag mismatch from {}", peer.id))
        );
        state = state.advance()?;

        let key = derive_session_key(&*self.mac, &shared);
        state = state.advance()?;
        info!("{} authenticated {}; session established", cfg.name, peer.id);

        for round in 1..=DEMO_ROUND_TRIPS {
            let message = recv_encrypted(wire, &*self.cipher, &key)?;
            info!("{} received: {}", cfg.name, message);
            let ack = format!(
                "{} acknowledges round {}/{}",
                cfg.name, round, DEMO_ROUND_TRIPS
            );
            send_encrypted(wire, &*self.cipher, &key, &ack)?;
        }
        state = state.advance()?;
        info!("{} handshake finished in state {:?}", cfg.name, state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cfg(name: &str, peer: &str, secret: &str) -> HandshakeConfig {
        HandshakeConfig::new(name, peer, secret).unwrap()
    }

    #[test]
    fn state_machine_is_linear_and_terminal() {
        use HandshakeState::*;
        let mut state = Idle;
        for expected in [
            ParamsExchanged,
            KeysExchanged,
            Authenticated,
            Confirmed,
            SessionActive,
            Success,
        ] {
            state = state.advance().unwrap();
            assert_eq!(state, expected);
        }
        assert!(Success.advance().is_err());
        assert!(Failed.advance().is_err());
    }

    #[test]
    fn config_rejects_reserved_identities_and_empty_secret() {
        assert!(HandshakeConfig::new("al|ice", "bob", "s").is_err());
        assert!(HandshakeConfig::new("alice", "bo:b", "s").is_err());
        assert!(HandshakeConfig::new("", "bob", "s").is_err());
        assert!(HandshakeConfig::new("alice", "bob", "").is_err());
        assert!(HandshakeConfig::new("alice", "bob", "s").is_ok());
    }

    // Builds the listener's opening flight as it would appear on the
    // wire, with p=23, g=5, a=6 (so A=8), letting connector-side
    // validation run against a canned transcript.
    fn listener_flight(p: &str, pub_value: &str, id: &str, secret: &str) -> String {
        let payload = exchange_payload(p, "5", pub_value, Role::Listener, id, "bob");
        let mac = Blake2Mac.tag(secret.as_bytes(), payload.as_bytes());
        format!(
            "ID:{}\nP:{}\nG:5\nPUB:{}\nMAC:{}\n",
            id,
            p,
            pub_value,
            hex_encode(&mac)
        )
    }

    fn run_connector(transcript: &str) -> Result<()> {
        let connector = Connector::new(cfg("bob", "alice", "hunter2"));
        let mut wire = Wire::new(Cursor::new(transcript.as_bytes().to_vec()), Vec::new());
        connector.exchange(&mut wire)
    }

    #[test]
    fn connector_rejects_tampered_mac() {
        let mut flight = listener_flight("23", "8", "alice", "hunter2");
        // Flip the last hex digit of the MAC value, which is the final
        // character before the trailing newline.
        flight.pop();
        let last = flight.pop().unwrap();
        let flipped = if last == '0' { '1' } else { '0' };
        let tampered = format!("{}{}\n", flight, flipped);
        let err = run_connector(&tampered).unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::Authentication(_)),
            "got {}",
            err
        );
    }

    #[test]
    fn connector_rejects_wrong_secret() {
        let flight = listener_flight("23", "8", "alice", "not-hunter2");
        let err = run_connector(&flight).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Authentication(_)));
    }

    #[test]
    fn connector_rejects_unexpected_identity() {
        let flight = listener_flight("23", "8", "mallory", "hunter2");
        let err = run_connector(&flight).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
    }

    #[test]
    fn connector_rejects_composite_prime() {
        // MAC is valid, so the failure is the parameter check itself.
        let flight = listener_flight("25", "8", "alice", "hunter2");
        let err = run_connector(&flight).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Validation(_)));
    }

    #[test]
    fn connector_rejects_degenerate_public_value() {
        for bad in ["0", "1", "22", "23"] {
            let flight = listener_flight("23", bad, "alice", "hunter2");
            let err = run_connector(&flight).unwrap_err();
            assert!(
                matches!(err.kind(), ErrorKind::Validation(_)),
                "public value {} accepted",
                bad
            );
        }
    }

    #[test]
    fn connector_treats_closed_stream_as_transport_failure() {
        let err = run_connector("").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Transport(_)));
    }

    #[test]
    fn listener_rejects_wrong_connector_mac() {
        // The canned MAC can never match one computed over the
        // listener's freshly generated parameters, so this must stop
        // at the MAC check no matter what the session primes are.
        let listener = Listener::new(cfg("alice", "bob", "hunter2").with_prime_bits(64));
        let transcript = format!("PUB:8\nMAC:{}\nID:bob\nCONFIRM:00\n", "00".repeat(32));
        let mut wire = Wire::new(Cursor::new(transcript.into_bytes()), Vec::new());
        let err = listener.exchange(&mut wire).unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::Authentication(_)),
            "got {}",
            err
        );
    }

    #[test]
    fn listener_rejects_unexpected_identity_before_checking_the_mac() {
        let listener = Listener::new(cfg("alice", "bob", "hunter2").with_prime_bits(64));
        let transcript = format!("PUB:8\nMAC:{}\nID:mallory\nCONFIRM:00\n", "00".repeat(32));
        let mut wire = Wire::new(Cursor::new(transcript.into_bytes()), Vec::new());
        let err = listener.exchange(&mut wire).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
    }

    #[test]
    fn listener_fails_cleanly_when_peer_sends_nothing() {
        let listener = Listener::new(cfg("alice", "bob", "hunter2").with_prime_bits(64));
        let mut wire = Wire::new(Cursor::new(Vec::new()), Vec::new());
        let err = listener.exchange(&mut wire).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Transport(_)));
    }
}
