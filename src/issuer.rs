use crate::batch::{Batch, Opening, OpeningSet, SignedBlindedValue};
use crate::challenge::{Challenge, IndexSource, UniformIndex};
use crate::config::{IssuerParams, ProtocolConfig};
use crate::credential::Template;
use crate::error::{Error, Result};
use crate::primitive::BlindingPrimitive;
use std::fmt;
use tracing::{debug, info, warn};

/// Lifecycle of a single issuance. `Signed` and `Rejected` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IssuanceState {
    Idle,
    BatchReceived,
    IndexChosen,
    AwaitingOpening,
    Verifying,
    Signed,
    Rejected,
}

impl IssuanceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Signed | Self::Rejected)
    }

    fn can_advance_to(self, next: Self) -> bool {
        use IssuanceState::*;
        matches!(
            (self, next),
            (Idle, BatchReceived)
                | (Idle, Rejected)
                | (BatchReceived, IndexChosen)
                | (BatchReceived, Rejected)
                | (IndexChosen, AwaitingOpening)
                | (AwaitingOpening, Verifying)
                | (Verifying, Signed)
                | (Verifying, Rejected)
        )
    }
}

impl fmt::Display for IssuanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::BatchReceived => "batch-received",
            Self::IndexChosen => "index-chosen",
            Self::AwaitingOpening => "awaiting-opening",
            Self::Verifying => "verifying",
            Self::Signed => "signed",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// The signing authority of the cut-and-choose exchange.
///
/// Holds a keypair fixed at construction. All per-issuance state lives
/// in [`Issuance`], so one issuer can serve many requesters at once.
pub struct Issuer<P: BlindingPrimitive> {
    primitive: P,
    keypair: P::KeyPair,
    public_key: P::PublicKey,
    batch_size: usize,
    template: Template,
    index_source: Box<dyn IndexSource>,
}

impl<P: BlindingPrimitive> Issuer<P> {
    /// Generates a fresh keypair of `config.key_bits`.
    pub fn new(primitive: P, config: &ProtocolConfig) -> Result<Self> {
        config.validate()?;
        let keypair = primitive
            .generate_keypair(config.key_bits)
            .map_err(Error::KeyGeneration)?;
        info!(bits = config.key_bits, "issuer keypair generated");
        Self::with_keypair(primitive, keypair, config)
    }

    /// Refuses a configuration that leaves nothing to open.
    pub fn with_keypair(
        primitive: P,
        keypair: P::KeyPair,
        config: &ProtocolConfig,
    ) -> Result<Self> {
        config.validate()?;
        let public_key = primitive.public_key(&keypair);
        Ok(Self {
            primitive,
            keypair,
            public_key,
            batch_size: config.batch_size,
            template: config.template.clone(),
            index_source: Box::new(UniformIndex),
        })
    }

    /// Replaces the challenge source. Anything but a uniform,
    /// unpredictable source weakens the soundness bound.
    pub fn with_index_source(mut self, source: impl IndexSource + 'static) -> Self {
        self.index_source = Box::new(source);
        self
    }

    pub fn primitive(&self) -> &P {
        &self.primitive
    }

    pub fn public_key(&self) -> &P::PublicKey {
        &self.public_key
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn params(&self) -> IssuerParams<P::PublicKey> {
        IssuerParams {
            public_key: self.public_key.clone(),
            batch_size: self.batch_size,
            template: self.template.clone(),
        }
    }

    pub fn select_challenge_index(&self, batch_size: usize) -> Result<usize> {
        if batch_size == 0 {
            return Err(Error::ChallengeOutOfRange {
                index: 0,
                batch_size,
            });
        }
        let index = self.index_source.draw(batch_size);
        if index >= batch_size {
            return Err(Error::ChallengeOutOfRange { index, batch_size });
        }
        Ok(index)
    }

    /// Round one: accepts a batch and fixes the challenge index.
    ///
    /// A batch of the wrong size is refused before any randomness is drawn.
    pub fn submit(&self, batch: Batch<P::Commitment>) -> Result<Issuance<'_, P>> {
        let mut issuance = Issuance {
            issuer: self,
            batch,
            selected: 0,
            state: IssuanceState::Idle,
        };

        if issuance.batch.len() != self.batch_size {
            issuance.advance(IssuanceState::Rejected);
            warn!(
                expected = self.batch_size,
                actual = issuance.batch.len(),
                "batch refused"
            );
            return Err(Error::BatchSizeMismatch {
                expected: self.batch_size,
                actual: issuance.batch.len(),
            });
        }
        issuance.advance(IssuanceState::BatchReceived);

        issuance.selected = match self.select_challenge_index(self.batch_size) {
            Ok(index) => index,
            Err(e) => {
                issuance.advance(IssuanceState::Rejected);
                return Err(e);
            }
        };
        issuance.advance(IssuanceState::IndexChosen);
        info!(selected = issuance.selected, "issuer selected candidate");

        issuance.advance(IssuanceState::AwaitingOpening);
        Ok(issuance)
    }

    /// Checks one disclosed candidate against its commitment.
    ///
    /// Rejects a withheld slot, a document outside the template, and a
    /// factor/document pair that does not reproduce `commitment`.
    pub fn check_opening(
        &self,
        index: usize,
        commitment: &P::Commitment,
        opening: &Opening<P::Factor>,
    ) -> Result<()> {
        let (factor, document) = match opening {
            Opening::Disclosed { factor, document } => (factor, document),
            Opening::Withheld => return Err(Error::MissingOpening(index)),
        };

        if !self.template.matches(document.as_str()) {
            return Err(Error::TemplateViolation(index));
        }

        // an unusable factor is as much a mismatch as a wrong one
        let expected = self
            .primitive
            .recommit(document.as_bytes(), factor, &self.public_key)
            .map_err(|_| Error::ConsistencyViolation(index))?;
        if &expected != commitment {
            return Err(Error::ConsistencyViolation(index));
        }
        Ok(())
    }

    pub fn verify_opening(
        &self,
        commitment: &P::Commitment,
        opening: &Opening<P::Factor>,
    ) -> bool {
        self.check_opening(0, commitment, opening).is_ok()
    }
}

/// Per-call context of one issuance: the batch, the challenge and the
/// current state. Borrows the issuer immutably.
pub struct Issuance<'a, P: BlindingPrimitive> {
    issuer: &'a Issuer<P>,
    batch: Batch<P::Commitment>,
    selected: usize,
    state: IssuanceState,
}

impl<'a, P: BlindingPrimitive> Issuance<'a, P> {
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// The challenge to send back to the requester.
    pub fn challenge(&self) -> Challenge {
        Challenge::new(self.selected, self.batch.len())
    }

    pub fn state(&self) -> IssuanceState {
        self.state
    }

    pub fn batch(&self) -> &Batch<P::Commitment> {
        &self.batch
    }

    /// Round two: verifies every opening except the selected one and,
    /// only if all pass, signs the selected commitment.
    ///
    /// Any failure rejects the whole issuance; there is no partial signing.
    pub fn verify_and_sign(
        &mut self,
        openings: &OpeningSet<P::Factor>,
    ) -> Result<SignedBlindedValue<P::Signature>> {
        if self.state != IssuanceState::AwaitingOpening {
            return Err(Error::IssuanceClosed(self.state));
        }
        self.advance(IssuanceState::Verifying);

        match self.verify_then_sign(openings) {
            Ok(signed) => {
                self.advance(IssuanceState::Signed);
                info!(selected = self.selected, "signed blinded candidate");
                Ok(signed)
            }
            Err(e) => {
                self.advance(IssuanceState::Rejected);
                warn!(selected = self.selected, error = %e, "issuance rejected");
                Err(e)
            }
        }
    }

    fn verify_then_sign(
        &self,
        openings: &OpeningSet<P::Factor>,
    ) -> Result<SignedBlindedValue<P::Signature>> {
        let k = self.batch.len();
        if openings.len() > k {
            return Err(Error::BatchSizeMismatch {
                expected: k,
                actual: openings.len(),
            });
        }

        // Structural pass: every non-selected slot must be disclosed
        // before any commitment is recomputed.
        for i in (0..k).filter(|&i| i != self.selected) {
            match openings.get(i) {
                Some(Opening::Disclosed { .. }) => {}
                Some(Opening::Withheld) | None => return Err(Error::MissingOpening(i)),
            }
        }

        for (i, commitment) in self.batch.iter().enumerate() {
            if i == self.selected {
                continue;
            }
            let opening = openings.get(i).ok_or(Error::MissingOpening(i))?;
            self.issuer.check_opening(i, commitment, opening)?;
            debug!(index = i, "opening verified");
        }

        let commitment = self.batch.get(self.selected).ok_or(Error::ChallengeOutOfRange {
            index: self.selected,
            batch_size: k,
        })?;
        let signed = self
            .issuer
            .primitive
            .sign(commitment, &self.issuer.keypair)
            .map_err(Error::SigningUnavailable)?;
        Ok(SignedBlindedValue(signed))
    }

    fn advance(&mut self, next: IssuanceState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "issuance state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::CandidateSecret;
    use crate::challenge::ScriptedIndex;
    use crate::credential::Identity;
    use crate::requester::{PreparedBatch, Requester};
    use crate::rsa_blind::RsaBlind;
    use crate::error::ConfigError;
    use crate::test_utils::{agents, issuer_with, shared_keypair};
    use num_bigint::BigUint;
    use std::sync::Arc;

    const K: usize = 10;

    fn prepare(
        issuer: &Issuer<RsaBlind>,
    ) -> Result<(Requester<RsaBlind>, PreparedBatch<RsaBlind>)> {
        let requester = Requester::for_issuer(issuer);
        let prepared = requester.prepare_batch(&agents(K))?;
        Ok((requester, prepared))
    }

    fn replace_commitment(batch: &Batch<BigUint>, at: usize, with: BigUint) -> Batch<BigUint> {
        batch
            .iter()
            .enumerate()
            .map(|(i, c)| if i == at { with.clone() } else { c.clone() })
            .collect()
    }

    fn forged_secrets(
        issuer: &Issuer<RsaBlind>,
        secrets: &[CandidateSecret<BigUint>],
        at: usize,
    ) -> Vec<CandidateSecret<BigUint>> {
        let mut forged = secrets.to_vec();
        forged[at].document = issuer
            .template()
            .make_document(&Identity::new("Agent Z").unwrap());
        forged
    }

    #[test]
    fn batch_sizes_below_two_are_refused_at_construction() {
        for batch_size in [0, 1] {
            let config = ProtocolConfig {
                batch_size,
                ..ProtocolConfig::default()
            };
            assert!(matches!(
                Issuer::with_keypair(RsaBlind, shared_keypair(), &config),
                Err(Error::Config(ConfigError::BatchTooSmall(k))) if k == batch_size
            ));
            assert!(matches!(
                Issuer::new(RsaBlind, &config),
                Err(Error::Config(ConfigError::BatchTooSmall(k))) if k == batch_size
            ));
        }
    }

    #[test]
    fn wrong_batch_size_is_refused_before_any_draw() -> Result<()> {
        let source = Arc::new(ScriptedIndex::fixed(0));
        let issuer = issuer_with(source.clone());
        let (_, prepared) = prepare(&issuer)?;

        for size in [0, 1, K - 1, K + 1] {
            let batch: Batch<BigUint> =
                prepared.batch.iter().cycle().take(size).cloned().collect();
            let err = issuer.submit(batch).err().unwrap();
            assert!(matches!(
                err,
                Error::BatchSizeMismatch { expected: K, actual } if actual == size
            ));
            assert!(err.is_rejection());
        }
        assert_eq!(source.draws(), 0);
        Ok(())
    }

    #[test]
    fn honest_batch_is_signed_at_every_index() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::new((0..K).collect()));
        let (requester, prepared) = prepare(&issuer)?;

        for s in 0..K {
            let mut issuance = issuer.submit(prepared.batch.clone())?;
            assert_eq!(issuance.selected_index(), s);
            assert_eq!(issuance.state(), IssuanceState::AwaitingOpening);

            let openings = requester.open(&issuance.challenge(), &prepared.secrets)?;
            let signed = issuance.verify_and_sign(&openings)?;
            assert_eq!(issuance.state(), IssuanceState::Signed);

            let sig = requester.finalize(&prepared.secrets[s].factor, Some(signed))?;
            for (i, secret) in prepared.secrets.iter().enumerate() {
                assert_eq!(requester.verify(&secret.document, &sig), i == s);
            }
        }
        Ok(())
    }

    #[test]
    fn tampered_document_is_caught_unless_selected() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::new((0..K).collect()));
        let (requester, prepared) = prepare(&issuer)?;
        let tampered = 3;
        let forged = forged_secrets(&issuer, &prepared.secrets, tampered);

        let mut detected = 0;
        for s in 0..K {
            let mut issuance = issuer.submit(prepared.batch.clone())?;
            assert_eq!(issuance.selected_index(), s);
            let openings = requester.open(&issuance.challenge(), &forged)?;
            match issuance.verify_and_sign(&openings) {
                Err(Error::ConsistencyViolation(i)) => {
                    assert_eq!(i, tampered);
                    detected += 1;
                }
                Ok(_) => assert_eq!(s, tampered),
                Err(e) => panic!("unexpected {:?}", e),
            }
        }
        assert_eq!(detected, K - 1);
        Ok(())
    }

    #[test]
    fn tampered_commitment_is_caught_unless_selected() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::new((0..K).collect()));
        let (requester, prepared) = prepare(&issuer)?;
        let tampered = K - 1;
        let (other, _) = issuer
            .primitive()
            .commit(b"anything at all", issuer.public_key())
            .unwrap();
        let batch = replace_commitment(&prepared.batch, tampered, other);

        for s in 0..K {
            let mut issuance = issuer.submit(batch.clone())?;
            let openings = requester.open(&issuance.challenge(), &prepared.secrets)?;
            let result = issuance.verify_and_sign(&openings);
            if s == tampered {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(Error::ConsistencyViolation(i)) if i == tampered));
                assert_eq!(issuance.state(), IssuanceState::Rejected);
            }
        }
        Ok(())
    }

    #[test]
    fn off_template_document_is_rejected_even_when_consistent() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::fixed(0));
        let (requester, mut prepared) = prepare(&issuer)?;

        // a correctly committed candidate that grants something else
        let rogue = "The bearer of this signed document, Agent E, may withdraw any sum.";
        let (commitment, factor) = issuer
            .primitive()
            .commit(rogue.as_bytes(), issuer.public_key())
            .unwrap();
        prepared.batch = replace_commitment(&prepared.batch, 4, commitment.clone());
        prepared.secrets[4] = CandidateSecret {
            factor: factor.clone(),
            document: rogue.into(),
        };

        let opening = Opening::Disclosed {
            factor,
            document: rogue.into(),
        };
        assert!(!issuer.verify_opening(&commitment, &opening));

        let mut issuance = issuer.submit(prepared.batch.clone())?;
        let openings = requester.open(&issuance.challenge(), &prepared.secrets)?;
        assert!(matches!(
            issuance.verify_and_sign(&openings),
            Err(Error::TemplateViolation(4))
        ));
        Ok(())
    }

    #[test]
    fn one_bad_opening_rejects_the_whole_batch() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::fixed(0));
        let (requester, prepared) = prepare(&issuer)?;
        let forged = forged_secrets(&issuer, &prepared.secrets, K - 1);

        let mut issuance = issuer.submit(prepared.batch.clone())?;
        let openings = requester.open(&issuance.challenge(), &forged)?;
        let err = issuance.verify_and_sign(&openings).err().unwrap();
        assert!(matches!(err, Error::ConsistencyViolation(9)));
        assert_eq!(issuance.state(), IssuanceState::Rejected);

        // a corrected disclosure does not reopen a rejected issuance
        let honest = requester.open(&issuance.challenge(), &prepared.secrets)?;
        assert!(matches!(
            issuance.verify_and_sign(&honest),
            Err(Error::IssuanceClosed(IssuanceState::Rejected))
        ));
        Ok(())
    }

    #[test]
    fn signed_issuance_is_terminal() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::fixed(2));
        let (requester, prepared) = prepare(&issuer)?;
        let mut issuance = issuer.submit(prepared.batch.clone())?;
        let openings = requester.open(&issuance.challenge(), &prepared.secrets)?;
        issuance.verify_and_sign(&openings)?;
        assert!(issuance.state().is_terminal());
        assert!(matches!(
            issuance.verify_and_sign(&openings),
            Err(Error::IssuanceClosed(IssuanceState::Signed))
        ));
        Ok(())
    }

    #[test]
    fn missing_opening_is_structural() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::fixed(5));
        let (requester, prepared) = prepare(&issuer)?;
        let mut issuance = issuer.submit(prepared.batch.clone())?;
        let disclosed = requester.open(&issuance.challenge(), &prepared.secrets)?;

        // withhold a non-selected slot as well
        let mut slots: Vec<Opening<BigUint>> = disclosed.iter().cloned().collect();
        slots[7] = Opening::Withheld;
        assert!(matches!(
            issuance.verify_and_sign(&slots.into()),
            Err(Error::MissingOpening(7))
        ));

        // a short set is missing its tail
        let short: Vec<Opening<BigUint>> = disclosed.iter().take(8).cloned().collect();
        let mut issuance = issuer.submit(prepared.batch.clone())?;
        assert!(matches!(
            issuance.verify_and_sign(&short.into()),
            Err(Error::MissingOpening(8))
        ));
        Ok(())
    }

    #[test]
    fn selected_slot_content_is_ignored() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::fixed(K - 1));
        let (requester, prepared) = prepare(&issuer)?;

        // withheld tail slot may even be absent
        let mut issuance = issuer.submit(prepared.batch.clone())?;
        let without_tail: Vec<Opening<BigUint>> = requester
            .open(&issuance.challenge(), &prepared.secrets)?
            .iter()
            .take(K - 1)
            .cloned()
            .collect();
        assert!(issuance.verify_and_sign(&without_tail.into()).is_ok());

        // or carry garbage
        let mut issuance = issuer.submit(prepared.batch.clone())?;
        let mut slots: Vec<Opening<BigUint>> = requester
            .open(&issuance.challenge(), &prepared.secrets)?
            .iter()
            .cloned()
            .collect();
        slots[K - 1] = Opening::Disclosed {
            factor: BigUint::from(7u32),
            document: "not even close".into(),
        };
        assert!(issuance.verify_and_sign(&slots.into()).is_ok());
        Ok(())
    }

    #[test]
    fn oversized_opening_set_is_refused() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::fixed(0));
        let (requester, prepared) = prepare(&issuer)?;
        let mut issuance = issuer.submit(prepared.batch.clone())?;
        let mut slots: Vec<Opening<BigUint>> = requester
            .open(&issuance.challenge(), &prepared.secrets)?
            .iter()
            .cloned()
            .collect();
        slots.push(Opening::Withheld);
        assert!(matches!(
            issuance.verify_and_sign(&slots.into()),
            Err(Error::BatchSizeMismatch { expected: K, actual: 11 })
        ));
        Ok(())
    }

    #[test]
    fn signing_failure_is_not_a_rejection() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::fixed(6));
        let (requester, prepared) = prepare(&issuer)?;
        let oversized = issuer.public_key().n.clone() + 5u32;
        let batch = replace_commitment(&prepared.batch, 6, oversized);

        let mut issuance = issuer.submit(batch)?;
        let openings = requester.open(&issuance.challenge(), &prepared.secrets)?;
        let err = issuance.verify_and_sign(&openings).err().unwrap();
        assert!(matches!(err, Error::SigningUnavailable(_)));
        assert!(!err.is_rejection());
        assert_eq!(issuance.state(), IssuanceState::Rejected);
        Ok(())
    }

    #[test]
    fn out_of_range_challenge_is_an_error() -> Result<()> {
        let issuer = issuer_with(ScriptedIndex::fixed(K));
        let (_, prepared) = prepare(&issuer)?;
        assert!(matches!(
            issuer.submit(prepared.batch),
            Err(Error::ChallengeOutOfRange { index: K, batch_size: K })
        ));
        Ok(())
    }

    #[test]
    fn random_challenges_catch_a_single_cheat() -> Result<()> {
        let issuer = issuer_with(UniformIndex);
        let (requester, prepared) = prepare(&issuer)?;
        let forged = forged_secrets(&issuer, &prepared.secrets, 0);

        let trials = 300;
        let mut detected = 0;
        for _ in 0..trials {
            let mut issuance = issuer.submit(prepared.batch.clone())?;
            let openings = requester.open(&issuance.challenge(), &forged)?;
            if issuance.verify_and_sign(&openings).is_err() {
                detected += 1;
            }
        }
        // expected 270 at K = 10; both bounds are several deviations out
        assert!(detected >= 240, "detected {} of {}", detected, trials);
        assert!(detected < trials);
        Ok(())
    }

    #[test]
    fn concurrent_issuances_share_one_issuer() -> Result<()> {
        let issuer = issuer_with(UniformIndex);
        let issuer = &issuer;

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(move || -> Result<()> {
                        let requester = Requester::for_issuer(issuer);
                        for _ in 0..3 {
                            let issued = requester.request(issuer, &agents(K))?;
                            assert!(requester.verify(&issued.document, &issued.signature));
                        }
                        Ok(())
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap()?;
            }
            Ok(())
        })
    }
}
