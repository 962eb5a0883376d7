//! Full-handshake scenarios over loopback TCP, one thread per role.

use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use dhshake::{Connector, HandshakeConfig, Listener};

fn config(name: &str, peer: &str, secret: &str) -> HandshakeConfig {
    HandshakeConfig::new(name, peer, secret)
        .expect("config rejected")
        .with_prime_bits(64)
        .with_step_timeout(Some(Duration::from_secs(10)))
}

// Runs one listener/connector pair over loopback and returns both
// outcomes (listener first).
fn run_pair(listener_cfg: HandshakeConfig, connector_cfg: HandshakeConfig) -> (bool, bool) {
    let server = TcpListener::bind("127.0.0.1:0").expect("bind failed");
    let addr = server.local_addr().expect("no local addr");

    let listener = thread::spawn(move || {
        let (stream, _) = server.accept().expect("accept failed");
        Listener::new(listener_cfg).run(stream)
    });

    let stream = TcpStream::connect(addr).expect("connect failed");
    let connector_ok = Connector::new(connector_cfg).run(stream);
    let listener_ok = listener.join().expect("listener panicked");
    (listener_ok, connector_ok)
}

#[test]
fn matching_secrets_complete_the_handshake_on_both_ends() {
    let (listener_ok, connector_ok) = run_pair(
        config("alice", "bob", "our shared secret"),
        config("bob", "alice", "our shared secret"),
    );
    assert!(listener_ok, "listener side should succeed");
    assert!(connector_ok, "connector side should succeed");
}

#[test]
fn mismatched_secret_fails_before_any_session_material() {
    let (listener_ok, connector_ok) = run_pair(
        config("alice", "bob", "our shared secret"),
        config("bob", "alice", "a different secret"),
    );
    assert!(!listener_ok, "listener must reject a bad MAC");
    assert!(!connector_ok, "connector cannot complete either");
}

#[test]
fn wrong_expected_identity_fails_both_sides() {
    // Listener expects carol; bob shows up.
    let (listener_ok, connector_ok) = run_pair(
        config("alice", "carol", "our shared secret"),
        config("bob", "alice", "our shared secret"),
    );
    assert!(!listener_ok);
    assert!(!connector_ok);
}

#[test]
fn connection_refused_reports_failure_instead_of_panicking() {
    // Grab an ephemeral port, then free it before connecting.
    let port = {
        let server = TcpListener::bind("127.0.0.1:0").expect("bind failed");
        server.local_addr().expect("no local addr").port()
    };
    let connector = Connector::new(config("bob", "alice", "our shared secret"));
    assert!(!connector.connect("127.0.0.1", port));
}
