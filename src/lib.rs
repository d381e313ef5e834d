//! Cut-and-choose blind signature issuance.
//!
//! A requester blinds K candidate credentials and submits them to an
//! [`Issuer`]. The issuer picks one at random, has the requester open
//! the other K - 1, checks each against the credential [`Template`] and
//! its commitment, and signs the unopened candidate only if every check
//! passes. The requester then unblinds the result into an ordinary
//! signature on a document the issuer never saw.

mod batch;
#[cfg(feature = "bls")]
mod bls;
mod challenge;
mod config;
mod credential;
mod error;
mod issuer;
mod primitive;
mod requester;
mod rsa_blind;
#[cfg(test)]
mod test_utils;
mod utils;

pub use crate::batch::{
    Batch, CandidateSecret, FinalSignature, Opening, OpeningSet, SignedBlindedValue,
};
#[cfg(feature = "bls")]
pub use crate::bls::{BlsBlind, Envelope};
pub use crate::challenge::{Challenge, IndexSource, UniformIndex};
pub use crate::config::{IssuerParams, ProtocolConfig, DEFAULT_BATCH_SIZE, DEFAULT_KEY_BITS};
pub use crate::credential::{CredentialDocument, Identity, Template};
pub use crate::error::{ConfigError, Error, IssuanceError, PrimitiveError, Result};
pub use crate::issuer::{Issuance, IssuanceState, Issuer};
pub use crate::primitive::BlindingPrimitive;
pub use crate::requester::{IssuedCredential, PreparedBatch, Requester};
pub use crate::rsa_blind::{RsaBlind, RsaKeyPair, RsaPublicKey};
