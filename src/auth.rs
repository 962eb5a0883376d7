//! Authentication and key derivation.
//!
//! A single keyed-digest construction backs the pre-shared-secret MAC,
//! the direction-bound confirmation tags and the session key. The
//! digest runs over `secret || "|" || payload`, which keeps tags
//! deterministic and order-sensitive; it is deliberately not an HMAC
//! and must not be treated as one.

use blake2_rfc::blake2b::Blake2b;
use clear_on_drop::ClearOnDrop;
use num_bigint::BigUint;
use subtle::ConstantTimeEq;

use crate::participant::Role;

/// Tag and session-key length in bytes.
pub const MAC_LEN: usize = 32;

// Derivation context distinguishers. The confirm context binds role
// and both identities so a tag from one direction cannot be replayed
// as the other.
const CONFIRM_CONTEXT: &str = "CONFIRM";
const SESSION_KEY_CONTEXT: &str = "SESSION_KEY";

/// The keyed-tag primitive used for authentication and derivation.
///
/// The handshake engine only sees this trait, so a vetted construction
/// (an HMAC, say) can replace [`Blake2Mac`] without touching protocol
/// code.
pub trait Mac: Send + Sync {
    /// Computes a tag over `payload` under `secret`.
    fn tag(&self, secret: &[u8], payload: &[u8]) -> [u8; MAC_LEN];
}

/// Default tag primitive: BLAKE2b-256 over `secret || "|" || payload`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Blake2Mac;

impl Mac for Blake2Mac {
    fn tag(&self, secret: &[u8], payload: &[u8]) -> [u8; MAC_LEN] {
        let mut h = Blake2b::new(MAC_LEN);
        h.update(secret);
        h.update(b"|");
        h.update(payload);
        let mut out = [0u8; MAC_LEN];
        out.copy_from_slice(h.finalize().as_bytes());
        out
    }
}

#[derive(Debug, Default, PartialEq)]
/// Wrapper type for secret key values.
pub struct KeyMaterial([u8; MAC_LEN]);

impl KeyMaterial {
    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl ::std::ops::Deref for KeyMaterial {
    type Target = [u8; MAC_LEN];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// A container struct needed to use ClearOnDrop on values
// of type KeyMaterial.
#[derive(Debug, Default)]
/// Cell holding a value that will be cleared on drop.
///
/// Implements `Deref` so that its data can be accessed
/// with the `*` operator.
pub struct DropCell<T: ::std::fmt::Debug + Default>(T);
impl<T> ::std::ops::Deref for DropCell<T>
where
    T: ::std::fmt::Debug + ::std::default::Default,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl<T> ::std::ops::DerefMut for DropCell<T>
where
    T: ::std::fmt::Debug + ::std::default::Default,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// The derived session key, wiped from memory when dropped.
///
/// Implements `Deref` so the key bytes can be accessed with the `*`
/// operator.
pub type SessionKey = ClearOnDrop<DropCell<KeyMaterial>>;

/// Derives a confirmation tag from the shared secret, bound to the
/// sender's role and both identities.
///
/// The payload is `CONFIRM|role|self|peer`; the secret is the decimal
/// rendering of the shared value. Swapping role or identities yields a
/// different tag, which is what defeats reflection of a tag back at
/// its sender.
pub fn derive_confirm_tag(
    mac: &dyn Mac,
    shared_secret: &BigUint,
    role: Role,
    self_id: &str,
    peer_id: &str,
) -> [u8; MAC_LEN] {
    let payload = format!(
        "{}|{}|{}|{}",
        CONFIRM_CONTEXT,
        role.as_str(),
        self_id,
        peer_id
    );
    mac.tag(shared_secret.to_string().as_bytes(), payload.as_bytes())
}

/// Derives the symmetric session key from the shared secret.
pub fn derive_session_key(mac: &dyn Mac, shared_secret: &BigUint) -> SessionKey {
    let tag = mac.tag(
        shared_secret.to_string().as_bytes(),
        SESSION_KEY_CONTEXT.as_bytes(),
    );
    ClearOnDrop::new(DropCell(KeyMaterial(tag)))
}

/// Compares an expected tag against a received one in constant time.
///
/// A length mismatch fails immediately; equal-length inputs are
/// compared without data-dependent branching.
pub fn verify_tag(expected: &[u8], received: &[u8]) -> bool {
    if expected.len() != received.len() {
        return false;
    }
    expected.ct_eq(received).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_deterministic_and_keyed() {
        let mac = Blake2Mac;
        let a = mac.tag(b"secret", b"payload");
        assert_eq!(a, mac.tag(b"secret", b"payload"));
        assert_ne!(a, mac.tag(b"secret2", b"payload"));
        assert_ne!(a, mac.tag(b"secret", b"payload2"));
    }

    #[test]
    fn tag_is_order_sensitive() {
        // secret/payload boundary matters: ("ab", "c") != ("a", "bc")
        let mac = Blake2Mac;
        assert_ne!(mac.tag(b"ab", b"c"), mac.tag(b"a", b"bc"));
    }

    #[test]
    fn confirm_tag_binds_direction() {
        let mac = Blake2Mac;
        let s = BigUint::from(2u32);
        let listener = derive_confirm_tag(&mac, &s, Role::Listener, "alice", "bob");
        let connector = derive_confirm_tag(&mac, &s, Role::Connector, "bob", "alice");
        let reflected = derive_confirm_tag(&mac, &s, Role::Listener, "bob", "alice");
        assert_ne!(listener, connector);
        assert_ne!(listener, reflected);
    }

    #[test]
    fn session_key_differs_from_confirm_tags() {
        let mac = Blake2Mac;
        let s = BigUint::from(2u32);
        let key = derive_session_key(&mac, &s);
        let confirm = derive_confirm_tag(&mac, &s, Role::Listener, "alice", "bob");
        assert_ne!(**key, confirm);
    }

    #[test]
    fn verify_tag_accepts_equal_rejects_tampered() {
        let mac = Blake2Mac;
        let tag = mac.tag(b"secret", b"payload");
        assert!(verify_tag(&tag, &tag));

        // Any single flipped byte must fail.
        for i in 0..tag.len() {
            let mut tampered = tag;
            tampered[i] ^= 0x01;
            assert!(!verify_tag(&tag, &tampered), "byte {} accepted", i);
        }
        assert!(!verify_tag(&tag, &tag[..31]));
    }
}
