//! Session parameter and private-key generation.
//!
//! Parameters are generated once per session by the listener: a fresh
//! probable prime of the requested bit length and a small generator.
//! The connector adopts whatever it receives, after validation.

use log::info;
use num_bigint::{BigUint, RandBigInt};
use num_traits::One;
use rand::Rng;

use crate::errors::{ErrorKind, Result};
use crate::numeric::{check_prime, is_probably_prime, MR_ROUNDS_GENERATE};
use error_chain::ensure;

/// Default prime strength for both roles.
pub const DEFAULT_PRIME_BITS: u64 = 512;

/// The public parameters shared by both peers: prime modulus `p` and
/// generator `g`. Immutable once agreed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    /// The prime modulus.
    pub p: BigUint,
    /// The generator, a small integer with 1 < g < p.
    pub g: BigUint,
}

impl DhParams {
    /// Generates fresh parameters: a probable prime of exactly `bits`
    /// bits and a generator picked by [`select_generator`].
    pub fn generate(bits: u64) -> Result<DhParams> {
        let p = generate_prime(bits)?;
        let g = select_generator();
        Ok(DhParams { p, g })
    }

    /// Validates the parameters as received from a peer: `p` odd,
    /// greater than 3 and probably prime under `rounds` witnesses,
    /// and `1 < g < p`.
    pub fn validate(&self, rounds: usize) -> Result<()> {
        check_prime(&self.p, rounds)?;
        ensure!(
            self.g > BigUint::one() && self.g < self.p,
            ErrorKind::Validation(format!("generator {} out of range", self.g))
        );
        Ok(())
    }
}

/// Generates a probable prime with exactly `bits` bits.
///
/// Candidates are sampled with the top bit forced to 1 (fixing the bit
/// length) and the bottom bit forced to 1 (forcing oddness), then
/// tested with 25 Miller-Rabin rounds until one passes. There is no
/// retry bound; prime density makes termination near-certain.
///
/// Bit lengths below 2 are rejected: a forced-odd 1-bit candidate is
/// the constant 1 and can never pass the test.
pub fn generate_prime(bits: u64) -> Result<BigUint> {
    ensure!(
        bits >= 2,
        ErrorKind::Validation(format!("prime bit length must be >= 2, got {}", bits))
    );

    let mut rng = rand::thread_rng();
    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate |= BigUint::one() << (bits - 1);
        candidate |= BigUint::one();
        if is_probably_prime(&candidate, MR_ROUNDS_GENERATE) {
            info!("generated {}-bit prime: {}", bits, candidate);
            return Ok(candidate);
        }
    }
}

/// Picks the session generator with a uniform coin flip between the
/// two customary small candidates, 2 and 5.
///
/// No primitive-root or quadratic-residue verification is performed;
/// the chosen value may generate a small subgroup of the full
/// multiplicative group.
pub fn select_generator() -> BigUint {
    if rand::thread_rng().gen::<bool>() {
        BigUint::from(2u32)
    } else {
        BigUint::from(5u32)
    }
}

/// Samples a private key uniformly from `[2, bits - 1]`, where `bits`
/// is the bit length of the session prime.
///
/// The range is deliberately derived from the prime's *bit length*
/// rather than from `p - 2`, matching the wire behavior this protocol
/// interoperates with; for large primes the usable exponent space is
/// therefore far smaller than the full group.
pub fn sample_private_key(bits: u64) -> Result<BigUint> {
    ensure!(
        bits > 2,
        ErrorKind::Validation(format!(
            "private-key range [2, {}] is empty for bit length {}",
            bits.saturating_sub(1),
            bits
        ))
    );
    let lo = BigUint::from(2u32);
    let hi = BigUint::from(bits); // exclusive upper bound
    Ok(rand::thread_rng().gen_biguint_range(&lo, &hi))
}

/// Checks a peer-supplied public value for the degenerate subgroup
/// elements: accepts only `1 < y < p - 1` (ruling out 0, 1 and p-1).
pub fn validate_public_value(y: &BigUint, p: &BigUint) -> Result<()> {
    let one = BigUint::one();
    ensure!(
        y > &one && *y < p - &one,
        ErrorKind::Validation(format!("public value {} out of range", y))
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::MR_ROUNDS_PEER;

    #[test]
    fn generated_prime_has_exact_bit_length_and_is_odd() {
        for bits in [8u64, 16, 64] {
            let p = generate_prime(bits).unwrap();
            assert_eq!(p.bits(), bits);
            assert!(p.bit(0), "generated prime must be odd");
            assert!(is_probably_prime(&p, MR_ROUNDS_GENERATE));
        }
    }

    #[test]
    fn generate_prime_rejects_tiny_bit_lengths() {
        assert!(generate_prime(0).is_err());
        assert!(generate_prime(1).is_err());
    }

    #[test]
    fn generator_is_two_or_five() {
        for _ in 0..32 {
            let g = select_generator();
            assert!(g == BigUint::from(2u32) || g == BigUint::from(5u32));
        }
    }

    #[test]
    fn private_key_stays_in_bit_length_range() {
        let lo = BigUint::from(2u32);
        let hi = BigUint::from(511u32);
        for _ in 0..64 {
            let a = sample_private_key(512).unwrap();
            assert!(a >= lo && a <= hi, "{} outside [2, 511]", a);
        }
    }

    #[test]
    fn private_key_range_empty_for_tiny_bits() {
        assert!(sample_private_key(2).is_err());
        assert!(sample_private_key(0).is_err());
    }

    #[test]
    fn public_value_range_check() {
        let p = BigUint::from(23u32);
        assert!(validate_public_value(&BigUint::from(0u32), &p).is_err());
        assert!(validate_public_value(&BigUint::from(1u32), &p).is_err());
        assert!(validate_public_value(&BigUint::from(22u32), &p).is_err());
        assert!(validate_public_value(&BigUint::from(23u32), &p).is_err());
        assert!(validate_public_value(&BigUint::from(2u32), &p).is_ok());
        assert!(validate_public_value(&BigUint::from(21u32), &p).is_ok());
    }

    #[test]
    fn params_validate_accepts_good_and_rejects_composite() {
        let good = DhParams {
            p: BigUint::from(23u32),
            g: BigUint::from(5u32),
        };
        assert!(good.validate(MR_ROUNDS_PEER).is_ok());

        let composite = DhParams {
            p: BigUint::from(25u32),
            g: BigUint::from(5u32),
        };
        assert!(composite.validate(MR_ROUNDS_PEER).is_err());

        let bad_g = DhParams {
            p: BigUint::from(23u32),
            g: BigUint::from(23u32),
        };
        assert!(bad_g.validate(MR_ROUNDS_PEER).is_err());
    }
}
