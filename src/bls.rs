//! Blind BLS signatures on BLS12-381.
//!
//! The candidate document is hashed onto G2 and multiplied by a random
//! scalar. Because BLS signing is itself a scalar multiplication, the
//! issuer's signature on the masked point unmasks to a plain BLS
//! signature on the document.

use crate::error::PrimitiveError;
use crate::primitive::BlindingPrimitive;
use blst::{blst_hash_to_g2, blst_p2, blst_p2_compress};
use blsttc::ff::{Field, PrimeField}; // for Fr trait
use blsttc::group::{CurveAffine, CurveProjective, EncodedPoint};
use blsttc::pairing::bls12_381::{Fr, FrRepr, G2Affine, G2};
use blsttc::{PublicKey, SecretKey, Signature};
use std::borrow::Borrow;

/// An Envelope holds a credential document inside without
/// revealing it: the compressed point H(doc) * r.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Envelope([u8; 96]);

impl Envelope {
    pub fn to_bytes(&self) -> [u8; 96] {
        self.0
    }
}

impl From<[u8; 96]> for Envelope {
    fn from(b: [u8; 96]) -> Self {
        Self(b)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BlsBlind;

impl BlindingPrimitive for BlsBlind {
    type KeyPair = SecretKey;
    type PublicKey = PublicKey;
    type Commitment = Envelope;
    type Factor = Fr;
    type Signature = Signature;

    // The curve fixes the security level.
    fn generate_keypair(&self, _security_bits: usize) -> Result<SecretKey, PrimitiveError> {
        Ok(SecretKey::random())
    }

    fn public_key(&self, keypair: &SecretKey) -> PublicKey {
        keypair.public_key()
    }

    fn commit(
        &self,
        document: &[u8],
        pk: &PublicKey,
    ) -> Result<(Envelope, Fr), PrimitiveError> {
        let r = fr_from_be_bytes(SecretKey::random().to_bytes());
        let envelope = self.recommit(document, &r, pk)?;
        Ok((envelope, r))
    }

    fn recommit(
        &self,
        document: &[u8],
        factor: &Fr,
        _pk: &PublicKey,
    ) -> Result<Envelope, PrimitiveError> {
        let msg_g2 = hash_g2_with_dst(document)?;
        Ok(Envelope(g2_to_be_bytes(blind(msg_g2, *factor))))
    }

    fn sign(
        &self,
        commitment: &Envelope,
        keypair: &SecretKey,
    ) -> Result<Signature, PrimitiveError> {
        // Note we are signing a G2, not message bytes, so we can't
        // use SecretKey::sign(msg).
        let blinded = be_bytes_to_g2(commitment.0)?;
        let sig_g2 = sign_g2(blinded, fr_from_be_bytes(keypair.to_bytes()));
        Ok(Signature::from_bytes(g2_to_be_bytes(sig_g2))?)
    }

    fn unblind(
        &self,
        factor: &Fr,
        signed: &Signature,
        _pk: &PublicKey,
    ) -> Result<Signature, PrimitiveError> {
        let blinded_sig_g2 = be_bytes_to_g2(signed.to_bytes())?;
        let r_inv = factor.inverse().ok_or(PrimitiveError::NotInvertible)?;
        let unblinded = blinded_sig_g2.into_affine().mul(r_inv);
        Ok(Signature::from_bytes(g2_to_be_bytes(unblinded))?)
    }

    fn verify(&self, document: &[u8], signature: &Signature, pk: &PublicKey) -> bool {
        // pair(pk_as_g1, H(doc)) == pair(1_as_g1, sig)
        match hash_g2_with_dst(document) {
            Ok(data_g2) => pk.verify_g2(signature, data_g2),
            Err(_) => false,
        }
    }
}

fn hash_g2_with_dst(msg: &[u8]) -> Result<G2, PrimitiveError> {
    let mut msg_hash: blst_p2 = Default::default();
    let dst = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";
    let aug = b"";
    unsafe {
        blst_hash_to_g2(
            &mut msg_hash,
            msg.as_ptr(),
            msg.len(),
            dst.as_ptr(),
            dst.len(),
            aug.as_ptr(),
            aug.len(),
        )
    };
    let mut msg_g2_bytes = [0u8; 96];
    unsafe { blst_p2_compress(&mut msg_g2_bytes[0], &msg_hash) }
    be_bytes_to_g2(msg_g2_bytes)
}

// Input is always the encoding of an existing scalar (a secret key),
// so it is canonical.
fn fr_from_be_bytes(bytes: [u8; 32]) -> Fr {
    let mut le_bytes = bytes;
    le_bytes.reverse();
    let mut fr_u64s = [0u64; 4];
    for (i, limb) in fr_u64s.iter_mut().enumerate() {
        let mut next_u64_bytes = [0u8; 8];
        next_u64_bytes.copy_from_slice(&le_bytes[i * 8..(i + 1) * 8]);
        *limb = u64::from_le_bytes(next_u64_bytes);
    }
    Fr::from_repr(FrRepr(fr_u64s)).unwrap()
}

// y = x * r
fn blind(g2: G2, r: Fr) -> G2 {
    g2.into_affine().mul(r)
}

fn be_bytes_to_g2(bytes: [u8; 96]) -> Result<G2, PrimitiveError> {
    let mut compressed: <G2Affine as CurveAffine>::Compressed = EncodedPoint::empty();
    compressed.as_mut().copy_from_slice(bytes.borrow());
    let affine = compressed
        .into_affine()
        .ok()
        .ok_or(PrimitiveError::MalformedCommitment)?;
    Ok(affine.into_projective())
}

fn g2_to_be_bytes(g2: G2) -> [u8; 96] {
    let mut bytes = [0u8; 96];
    bytes.copy_from_slice(g2.into_affine().into_compressed().as_ref());
    bytes
}

fn sign_g2(g2: G2, fr: Fr) -> G2 {
    g2.into_affine().mul(fr)
}
