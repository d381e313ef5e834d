use crate::error::PrimitiveError;
use crate::primitive::BlindingPrimitive;
use crate::utils::*;
use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public half of an issuer key: modulus and exponent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaPublicKey {
    pub n: BigUint,
    pub e: BigUint,
}

/// Issuer keypair. The private exponent never leaves this struct.
#[derive(Clone)]
pub struct RsaKeyPair {
    public: RsaPublicKey,
    d: BigUint,
}

impl RsaKeyPair {
    pub fn public(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn bits(&self) -> u64 {
        self.public.n.bits()
    }
}

impl fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl From<&rsa::RsaPrivateKey> for RsaKeyPair {
    fn from(key: &rsa::RsaPrivateKey) -> Self {
        Self {
            public: RsaPublicKey {
                n: BigUint::from_bytes_be(&key.n().to_bytes_be()),
                e: BigUint::from_bytes_be(&key.e().to_bytes_be()),
            },
            d: BigUint::from_bytes_be(&key.d().to_bytes_be()),
        }
    }
}

/// Textbook RSA blind signatures over a SHA-256 digest.
///
/// commitment = H(m) * r^e mod n, signed = commitment^d mod n,
/// signature = signed * r^-1 mod n, valid iff signature^e == H(m) mod n.
#[derive(Clone, Copy, Debug, Default)]
pub struct RsaBlind;

impl BlindingPrimitive for RsaBlind {
    type KeyPair = RsaKeyPair;
    type PublicKey = RsaPublicKey;
    type Commitment = BigUint;
    type Factor = BigUint;
    type Signature = BigUint;

    fn generate_keypair(&self, security_bits: usize) -> Result<RsaKeyPair, PrimitiveError> {
        let key = rsa::RsaPrivateKey::new(&mut OsRng, security_bits)
            .map_err(|e| PrimitiveError::KeyGeneration(e.to_string()))?;
        Ok(RsaKeyPair::from(&key))
    }

    fn public_key(&self, keypair: &RsaKeyPair) -> RsaPublicKey {
        keypair.public.clone()
    }

    fn commit(
        &self,
        document: &[u8],
        pk: &RsaPublicKey,
    ) -> Result<(BigUint, BigUint), PrimitiveError> {
        let r = random_factor(&mut OsRng, &pk.n);
        let commitment = self.recommit(document, &r, pk)?;
        Ok((commitment, r))
    }

    fn recommit(
        &self,
        document: &[u8],
        factor: &BigUint,
        pk: &RsaPublicKey,
    ) -> Result<BigUint, PrimitiveError> {
        let m = hash_to_int(document) % &pk.n;
        Ok(blind(&m, factor, &pk.e, &pk.n))
    }

    fn sign(&self, commitment: &BigUint, keypair: &RsaKeyPair) -> Result<BigUint, PrimitiveError> {
        let n = &keypair.public.n;
        if commitment.is_zero() || commitment >= n {
            return Err(PrimitiveError::MalformedCommitment);
        }
        Ok(sign_int(commitment, &keypair.d, n))
    }

    fn unblind(
        &self,
        factor: &BigUint,
        signed: &BigUint,
        pk: &RsaPublicKey,
    ) -> Result<BigUint, PrimitiveError> {
        unblind(signed, factor, &pk.n).ok_or(PrimitiveError::NotInvertible)
    }

    fn verify(&self, document: &[u8], signature: &BigUint, pk: &RsaPublicKey) -> bool {
        if signature >= &pk.n {
            return false;
        }
        sign_int(signature, &pk.e, &pk.n) == hash_to_int(document) % &pk.n
    }
}
