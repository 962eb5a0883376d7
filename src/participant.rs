//! A single peer's view of one key exchange: identity, role, private
//! key and the derived public value.

use num_bigint::BigUint;

use crate::errors::{ErrorKind, Result};
use crate::keygen::{sample_private_key, validate_public_value, DhParams};
use crate::numeric::modpow;
use error_chain::ensure;

/// Distinguishes the two sides of a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepts one inbound connection and generates the session
    /// parameters.
    Listener,
    /// Initiates the connection and adopts the received parameters.
    Connector,
}

impl Role {
    /// The canonical label used in MAC payloads and confirmation tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Listener => "LISTENER",
            Role::Connector => "CONNECTOR",
        }
    }

    /// The opposite role.
    pub fn peer(&self) -> Role {
        match self {
            Role::Listener => Role::Connector,
            Role::Connector => Role::Listener,
        }
    }
}

/// One peer's keys for a single exchange.
///
/// The private key never leaves this struct; only the public value
/// `g^a mod p` is exposed for transmission.
pub struct Participant {
    name: String,
    role: Role,
    params: DhParams,
    private_key: BigUint,
    public_value: BigUint,
}

impl Participant {
    /// Generates a participant with a freshly sampled private key.
    ///
    /// The sampling range is derived from the bit length of `params.p`
    /// (see [`sample_private_key`]).
    pub fn generate(name: &str, role: Role, params: DhParams) -> Result<Participant> {
        let private_key = sample_private_key(params.p.bits())?;
        Participant::with_private_key(name, role, params, private_key)
    }

    /// Builds a participant from an explicit private key, checking
    /// `2 <= a <= p - 2`.
    pub fn with_private_key(
        name: &str,
        role: Role,
        params: DhParams,
        private_key: BigUint,
    ) -> Result<Participant> {
        let two = BigUint::from(2u32);
        ensure!(
            private_key >= two && private_key <= &params.p - &two,
            ErrorKind::Validation(format!(
                "private key {} outside [2, p-2]",
                private_key
            ))
        );
        let public_value = modpow(&params.g, &private_key, &params.p)?;
        Ok(Participant {
            name: name.to_owned(),
            role,
            params,
            private_key,
            public_value,
        })
    }

    /// The participant's identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The participant's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The session parameters this participant is bound to.
    pub fn params(&self) -> &DhParams {
        &self.params
    }

    /// The public value `g^a mod p`.
    pub fn public_value(&self) -> &BigUint {
        &self.public_value
    }

    /// Combines the peer's public value with the own private key to
    /// produce the shared secret `y^a mod p`.
    ///
    /// The peer value is range-checked first; degenerate subgroup
    /// elements are rejected rather than silently collapsing the
    /// secret to 0 or 1.
    pub fn shared_secret(&self, peer_public: &BigUint) -> Result<BigUint> {
        validate_public_value(peer_public, &self.params.p)?;
        modpow(peer_public, &self.private_key, &self.params.p)
    }
}

impl ::std::fmt::Debug for Participant {
    // Keeps the private key out of debug output.
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("public_value", &self.public_value)
            .finish()
    }
}
