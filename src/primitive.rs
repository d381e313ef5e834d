use crate::error::PrimitiveError;
use std::fmt::Debug;

/// A public-key scheme that supports signing a value through a
/// multiplicative mask the signer never sees removed.
///
/// The issuance protocol only relies on this surface, so any scheme
/// where a commitment can be recomputed from its opening plugs in.
pub trait BlindingPrimitive: Clone + Send + Sync {
    type KeyPair: Send + Sync;
    type PublicKey: Clone + Debug + Send + Sync;
    type Commitment: Clone + PartialEq + Debug + Send + Sync;
    type Factor: Clone + PartialEq + Debug + Send + Sync;
    type Signature: Clone + PartialEq + Debug + Send + Sync;

    fn generate_keypair(&self, security_bits: usize) -> Result<Self::KeyPair, PrimitiveError>;

    fn public_key(&self, keypair: &Self::KeyPair) -> Self::PublicKey;

    /// Masks `document` under a fresh blinding factor.
    fn commit(
        &self,
        document: &[u8],
        pk: &Self::PublicKey,
    ) -> Result<(Self::Commitment, Self::Factor), PrimitiveError>;

    /// Recomputes the commitment a disclosed `(factor, document)` pair
    /// must have produced. Deterministic.
    fn recommit(
        &self,
        document: &[u8],
        factor: &Self::Factor,
        pk: &Self::PublicKey,
    ) -> Result<Self::Commitment, PrimitiveError>;

    fn sign(
        &self,
        commitment: &Self::Commitment,
        keypair: &Self::KeyPair,
    ) -> Result<Self::Signature, PrimitiveError>;

    fn unblind(
        &self,
        factor: &Self::Factor,
        signed: &Self::Signature,
        pk: &Self::PublicKey,
    ) -> Result<Self::Signature, PrimitiveError>;

    fn verify(&self, document: &[u8], signature: &Self::Signature, pk: &Self::PublicKey) -> bool;
}
