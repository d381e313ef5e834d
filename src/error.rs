#[cfg(feature = "bls")]
use blst::BLST_ERROR;
#[cfg(feature = "bls")]
use blsttc::error::FromBytesError;
use std::io;
use thiserror::Error;

/// Specialisation of `std::Result`.
pub type Result<T, E = IssuanceError> = std::result::Result<T, E>;
pub type Error = IssuanceError;

#[derive(Error, Debug)]
/// Failures raised by a blinding primitive itself.
pub enum PrimitiveError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("blinded commitment is outside the signing range")]
    MalformedCommitment,

    #[error("blinding factor has no inverse modulo the public modulus")]
    NotInvertible,

    #[cfg(feature = "bls")]
    #[error("blst error")]
    Blst(BLST_ERROR),

    #[cfg(feature = "bls")]
    #[error("deserialization from bytes failed")]
    BlsttcFromBytes(#[from] FromBytesError),
}

#[cfg(feature = "bls")]
impl From<BLST_ERROR> for PrimitiveError {
    fn from(e: BLST_ERROR) -> Self {
        Self::Blst(e)
    }
}

#[derive(Error, Debug)]
/// Issuance failures, split between structural, verification and
/// primitive-level causes.
pub enum IssuanceError {
    #[error("expected a batch of {expected} candidates, got {actual}")]
    BatchSizeMismatch { expected: usize, actual: usize },

    #[error("expected {expected} identities to build a batch, got {actual}")]
    InvalidBatchSize { expected: usize, actual: usize },

    #[error("identity label must not contain line breaks")]
    InvalidIdentity,

    #[error("challenge index {index} is outside a batch of {batch_size}")]
    ChallengeOutOfRange { index: usize, batch_size: usize },

    #[error("no opening disclosed for candidate {0}")]
    MissingOpening(usize),

    #[error("candidate {0} does not match the credential template")]
    TemplateViolation(usize),

    #[error("candidate {0} does not match its blinded commitment")]
    ConsistencyViolation(usize),

    #[error("issuance is already {0}")]
    IssuanceClosed(crate::issuer::IssuanceState),

    #[error("issuer returned no signed value")]
    SigningFailed,

    #[error("invalid protocol configuration")]
    Config(#[from] ConfigError),

    #[error("key generation failed")]
    KeyGeneration(#[source] PrimitiveError),

    #[error("blinding a candidate failed")]
    CommitFailure(#[source] PrimitiveError),

    #[error("signing primitive unavailable")]
    SigningUnavailable(#[source] PrimitiveError),

    #[error("unblinding the signature failed")]
    UnblindFailure(#[source] PrimitiveError),

    #[error("unblinded signature does not verify against the selected document")]
    InvalidSignature,
}

impl IssuanceError {
    /// True when the issuer refused the batch, as opposed to a
    /// malfunction of the underlying cryptosystem.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::BatchSizeMismatch { .. }
                | Self::MissingOpening(_)
                | Self::TemplateViolation(_)
                | Self::ConsistencyViolation(_)
        )
    }

    /// The step of an issuance at which this error surfaces.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::KeyGeneration(_) => "setting up the issuer",
            Self::InvalidBatchSize { .. } | Self::InvalidIdentity | Self::CommitFailure(_) => {
                "preparing candidate batch"
            }
            Self::BatchSizeMismatch { .. } | Self::ChallengeOutOfRange { .. } => {
                "issuer refused the batch"
            }
            Self::MissingOpening(_)
            | Self::TemplateViolation(_)
            | Self::ConsistencyViolation(_)
            | Self::IssuanceClosed(_)
            | Self::SigningUnavailable(_) => "issuer verification",
            Self::SigningFailed | Self::UnblindFailure(_) | Self::InvalidSignature => {
                "unblinding signature"
            }
        }
    }
}

#[derive(Error, Debug)]
/// Failures loading a [`crate::ProtocolConfig`].
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] io::Error),

    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("batch size must be at least 2, got {0}")]
    BatchTooSmall(usize),
}
