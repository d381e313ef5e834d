use crate::challenge::Challenge;
use crate::credential::CredentialDocument;
use serde::{Deserialize, Serialize};

/// Ordered blinded commitments, one per candidate credential.
///
/// The index of each commitment is the reference frame both sides use
/// for the challenge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch<C> {
    commitments: Vec<C>,
}

impl<C> Batch<C> {
    pub fn len(&self) -> usize {
        self.commitments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commitments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&C> {
        self.commitments.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, C> {
        self.commitments.iter()
    }
}

impl<C> From<Vec<C>> for Batch<C> {
    fn from(commitments: Vec<C>) -> Self {
        Self { commitments }
    }
}

impl<C> FromIterator<C> for Batch<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self {
            commitments: iter.into_iter().collect(),
        }
    }
}

/// What a requester holds privately for one candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateSecret<F> {
    pub factor: F,
    pub document: CredentialDocument,
}

/// One slot of an [`OpeningSet`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Opening<F> {
    Disclosed {
        factor: F,
        document: CredentialDocument,
    },
    Withheld,
}

impl<F> Opening<F> {
    pub fn is_withheld(&self) -> bool {
        matches!(self, Opening::Withheld)
    }
}

/// Disclosures for every candidate of a batch, indexed like the batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpeningSet<F> {
    openings: Vec<Opening<F>>,
}

impl<F: Clone> OpeningSet<F> {
    /// Discloses every secret except the challenged one, which is
    /// replaced by [`Opening::Withheld`] unconditionally.
    pub(crate) fn redacted(challenge: &Challenge, secrets: &[CandidateSecret<F>]) -> Self {
        let withheld = challenge.index();
        let openings = secrets
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if i == withheld {
                    Opening::Withheld
                } else {
                    Opening::Disclosed {
                        factor: s.factor.clone(),
                        document: s.document.clone(),
                    }
                }
            })
            .collect();
        Self { openings }
    }
}

impl<F> OpeningSet<F> {
    pub fn len(&self) -> usize {
        self.openings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.openings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Opening<F>> {
        self.openings.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Opening<F>> {
        self.openings.iter()
    }
}

impl<F> From<Vec<Opening<F>>> for OpeningSet<F> {
    fn from(openings: Vec<Opening<F>>) -> Self {
        Self { openings }
    }
}

/// The issuer's signature over a blinded commitment. Not yet usable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedBlindedValue<S>(pub(crate) S);

impl<S> SignedBlindedValue<S> {
    pub fn new(signed: S) -> Self {
        Self(signed)
    }

    pub fn inner(&self) -> &S {
        &self.0
    }
}

/// An unblinded signature that verifies against the plain document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalSignature<S>(pub(crate) S);

impl<S> FinalSignature<S> {
    pub fn inner(&self) -> &S {
        &self.0
    }

    pub fn into_inner(self) -> S {
        self.0
    }
}
