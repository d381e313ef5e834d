use crate::batch::{Batch, CandidateSecret, FinalSignature, OpeningSet, SignedBlindedValue};
use crate::challenge::Challenge;
use crate::config::IssuerParams;
use crate::credential::{CredentialDocument, Identity};
use crate::error::{Error, Result};
use crate::issuer::Issuer;
use crate::primitive::BlindingPrimitive;
use tracing::{debug, info};

/// A blinded batch together with the secrets needed to open it.
#[derive(Clone, Debug)]
pub struct PreparedBatch<P: BlindingPrimitive> {
    pub batch: Batch<P::Commitment>,
    pub secrets: Vec<CandidateSecret<P::Factor>>,
}

/// The outcome of a successful issuance: one document and the issuer's
/// unblinded signature on it.
#[derive(Clone, Debug)]
pub struct IssuedCredential<P: BlindingPrimitive> {
    pub selected_index: usize,
    pub identity: Identity,
    pub document: CredentialDocument,
    pub signature: FinalSignature<P::Signature>,
}

/// Client side of the cut-and-choose exchange.
///
/// Batch size and template come from the issuer's published
/// [`IssuerParams`], never from a local constant.
#[derive(Clone, Debug)]
pub struct Requester<P: BlindingPrimitive> {
    primitive: P,
    params: IssuerParams<P::PublicKey>,
}

impl<P: BlindingPrimitive> Requester<P> {
    pub fn new(primitive: P, params: IssuerParams<P::PublicKey>) -> Self {
        Self { primitive, params }
    }

    pub fn for_issuer(issuer: &Issuer<P>) -> Self {
        Self::new(issuer.primitive().clone(), issuer.params())
    }

    pub fn params(&self) -> &IssuerParams<P::PublicKey> {
        &self.params
    }

    /// Renders and blinds one candidate per identity.
    pub fn prepare_batch(&self, identities: &[Identity]) -> Result<PreparedBatch<P>> {
        let k = self.params.batch_size;
        if identities.len() != k {
            return Err(Error::InvalidBatchSize {
                expected: k,
                actual: identities.len(),
            });
        }

        let mut commitments = Vec::with_capacity(k);
        let mut secrets = Vec::with_capacity(k);
        for identity in identities {
            let document = self.params.template.make_document(identity);
            let (commitment, factor) = self
                .primitive
                .commit(document.as_bytes(), &self.params.public_key)
                .map_err(Error::CommitFailure)?;
            commitments.push(commitment);
            secrets.push(CandidateSecret { factor, document });
        }
        debug!(candidates = k, "batch prepared");

        Ok(PreparedBatch {
            batch: Batch::from(commitments),
            secrets,
        })
    }

    /// Discloses every candidate except the challenged one.
    ///
    /// Only a [`Challenge`] handed out by an [`crate::Issuance`] is
    /// accepted, and it must come from an issuance of this batch size.
    pub fn open(
        &self,
        challenge: &Challenge,
        secrets: &[CandidateSecret<P::Factor>],
    ) -> Result<OpeningSet<P::Factor>> {
        let k = self.params.batch_size;
        if challenge.batch_size() != k {
            return Err(Error::BatchSizeMismatch {
                expected: k,
                actual: challenge.batch_size(),
            });
        }
        if secrets.len() != k {
            return Err(Error::InvalidBatchSize {
                expected: k,
                actual: secrets.len(),
            });
        }
        if challenge.index() >= k {
            return Err(Error::ChallengeOutOfRange {
                index: challenge.index(),
                batch_size: k,
            });
        }
        Ok(OpeningSet::redacted(challenge, secrets))
    }

    /// Strips the blinding factor from the issuer's response.
    pub fn finalize(
        &self,
        factor: &P::Factor,
        signed: Option<SignedBlindedValue<P::Signature>>,
    ) -> Result<FinalSignature<P::Signature>> {
        let signed = signed.ok_or(Error::SigningFailed)?;
        let signature = self
            .primitive
            .unblind(factor, signed.inner(), &self.params.public_key)
            .map_err(Error::UnblindFailure)?;
        Ok(FinalSignature(signature))
    }

    pub fn verify(
        &self,
        document: &CredentialDocument,
        signature: &FinalSignature<P::Signature>,
    ) -> bool {
        self.primitive
            .verify(document.as_bytes(), signature.inner(), &self.params.public_key)
    }

    /// Runs both rounds against `issuer` and checks the result.
    pub fn request(
        &self,
        issuer: &Issuer<P>,
        identities: &[Identity],
    ) -> Result<IssuedCredential<P>> {
        let PreparedBatch { batch, secrets } = self.prepare_batch(identities)?;

        let mut issuance = issuer.submit(batch)?;
        let challenge = issuance.challenge();
        let selected = challenge.index();
        info!(selected, "challenge received");

        let openings = self.open(&challenge, &secrets)?;
        let signed = issuance.verify_and_sign(&openings)?;

        let secret = &secrets[selected];
        let signature = self.finalize(&secret.factor, Some(signed))?;
        if !self.verify(&secret.document, &signature) {
            return Err(Error::InvalidSignature);
        }

        Ok(IssuedCredential {
            selected_index: selected,
            identity: identities[selected].clone(),
            document: secret.document.clone(),
            signature,
        })
    }
}
