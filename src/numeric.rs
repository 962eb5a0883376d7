//! Arbitrary-precision primitives: modular exponentiation and
//! probabilistic primality testing.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};

use crate::errors::{ErrorKind, Result};
use error_chain::{bail, ensure};

/// Miller-Rabin rounds for material generated locally.
pub const MR_ROUNDS_GENERATE: usize = 25;
/// Miller-Rabin rounds for values supplied by the peer.
pub const MR_ROUNDS_PEER: usize = 10;

/// Computes `base^exponent mod modulus`.
///
/// All operands are non-negative by construction; a zero modulus is
/// rejected rather than left to panic deep in the bignum layer.
pub fn modpow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> Result<BigUint> {
    ensure!(
        !modulus.is_zero(),
        ErrorKind::Validation("modulus must be positive".into())
    );
    Ok(base.modpow(exponent, modulus))
}

/// Miller-Rabin witness test with `rounds` random witnesses.
///
/// Returns `true` if `n` is prime with overwhelming probability; the
/// error probability is at most 4^-rounds. Witnesses are drawn
/// uniformly from `[2, n-2]`.
pub fn is_probably_prime(n: &BigUint, rounds: usize) -> bool {
    let two = BigUint::from(2u32);
    let three = BigUint::from(3u32);
    if n < &two {
        return false;
    }
    if n == &two || n == &three {
        return true;
    }
    if !n.bit(0) {
        return false;
    }

    // Write n-1 as d * 2^s with d odd.
    let n_minus_one = n - 1u32;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    let mut rng = rand::thread_rng();
    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 0..s.saturating_sub(1) {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Rejects composite or undersized inputs the way a handshake peer
/// would: `n` must be odd, greater than 3, and pass the witness test.
pub fn check_prime(n: &BigUint, rounds: usize) -> Result<()> {
    let three = BigUint::from(3u32);
    ensure!(
        n > &three,
        ErrorKind::Validation(format!("prime must exceed 3, got {}", n))
    );
    ensure!(
        n.bit(0),
        ErrorKind::Validation("prime must be odd".into())
    );
    if !is_probably_prime(n, rounds) {
        bail!(ErrorKind::Validation(format!(
            "{} failed {}-round primality test",
            n, rounds
        )));
    }
    Ok(())
}
