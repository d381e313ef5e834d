use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::One;
use rand::{CryptoRng, Rng};
use sha2::{Digest, Sha256};

// The document is reduced to a fixed-width SHA-256 digest read as a
// big-endian integer. Both the requester (when blinding) and the issuer
// (when checking an opening) go through here, so the two sides always
// agree on the value being masked.
pub(crate) fn hash_to_int(msg: &[u8]) -> BigUint {
    BigUint::from_bytes_be(&Sha256::digest(msg))
}

// r drawn uniformly from [2, n) until gcd(r, n) == 1
pub(crate) fn random_factor<R: Rng + CryptoRng>(rng: &mut R, n: &BigUint) -> BigUint {
    let low = BigUint::from(2u8);
    loop {
        let r = rng.gen_biguint_range(&low, n);
        if r.gcd(n).is_one() {
            return r;
        }
    }
}

// y = m * r^e mod n
pub(crate) fn blind(m: &BigUint, r: &BigUint, e: &BigUint, n: &BigUint) -> BigUint {
    (m * r.modpow(e, n)) % n
}

// x = y * 1/r mod n
pub(crate) fn unblind(y: &BigUint, r: &BigUint, n: &BigUint) -> Option<BigUint> {
    let r_inv = r.modinv(n)?;
    Some((y * r_inv) % n)
}

// s = y^d mod n. The same operation serves as the public check when
// called with e instead of d.
pub(crate) fn sign_int(y: &BigUint, d: &BigUint, n: &BigUint) -> BigUint {
    y.modpow(d, n)
}
