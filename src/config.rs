use crate::credential::Template;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Parameters both sides of an issuance must agree on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Candidates per batch (K).
    pub batch_size: usize,
    /// Security parameter passed to issuer key generation.
    pub key_bits: usize,
    pub template: Template,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            key_bits: DEFAULT_KEY_BITS,
            template: Template::default(),
        }
    }
}

impl ProtocolConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// K = 1 would leave nothing to open.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size < 2 {
            return Err(ConfigError::BatchTooSmall(self.batch_size));
        }
        Ok(())
    }
}

/// What an issuer publishes to requesters: its public key and the
/// negotiated batch size and template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssuerParams<PK> {
    pub public_key: PK,
    pub batch_size: usize,
    pub template: Template,
}
