use crate::challenge::IndexSource;
use crate::config::ProtocolConfig;
use crate::credential::Identity;
use crate::issuer::Issuer;
use crate::primitive::BlindingPrimitive;
use crate::rsa_blind::{RsaBlind, RsaKeyPair};
use std::sync::OnceLock;

/// One small key per test binary; generating a fresh one per test
/// dominates run time.
pub(crate) fn shared_keypair() -> RsaKeyPair {
    static KEY: OnceLock<RsaKeyPair> = OnceLock::new();
    KEY.get_or_init(|| RsaBlind.generate_keypair(1024).unwrap())
        .clone()
}

pub(crate) fn issuer_with(source: impl IndexSource + 'static) -> Issuer<RsaBlind> {
    Issuer::with_keypair(RsaBlind, shared_keypair(), &ProtocolConfig::default())
        .unwrap()
        .with_index_source(source)
}

/// "Agent A", "Agent B", ...
pub(crate) fn agents(k: usize) -> Vec<Identity> {
    (0..k)
        .map(|i| Identity::new(format!("Agent {}", (b'A' + i as u8) as char)).unwrap())
        .collect()
}
