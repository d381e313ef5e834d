use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque label naming the bearer of a credential.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if has_line_break(&label) {
            return Err(Error::InvalidIdentity);
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = Error;

    fn try_from(label: String) -> Result<Self> {
        Self::new(label)
    }
}

impl TryFrom<&str> for Identity {
    type Error = Error;

    fn try_from(label: &str) -> Result<Self> {
        Self::new(label)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text rendered from exactly one identity by a [`Template`].
///
/// Documents received from a requester are not trusted to be
/// well-formed; the issuer checks them with [`Template::matches`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialDocument(String);

impl CredentialDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<String> for CredentialDocument {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for CredentialDocument {
    fn from(text: &str) -> Self {
        Self(text.to_owned())
    }
}

impl fmt::Display for CredentialDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed credential template: `prefix`, then the identity, then `suffix`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub prefix: String,
    pub suffix: String,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            prefix: "The bearer of this signed document, ".to_owned(),
            suffix: ", has full diplomatic immunity.".to_owned(),
        }
    }
}

impl Template {
    pub fn make_document(&self, identity: &Identity) -> CredentialDocument {
        CredentialDocument(format!("{}{}{}", self.prefix, identity, self.suffix))
    }

    /// Format check only: true when `doc` could have come from
    /// [`Template::make_document`] with some single-line identity.
    pub fn matches(&self, doc: &str) -> bool {
        if doc.len() < self.prefix.len() + self.suffix.len() {
            return false;
        }
        doc.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_suffix(self.suffix.as_str()))
            .is_some_and(|identity| !has_line_break(identity))
    }

    /// Recovers the identity substring of a well-formed document.
    pub fn identity_of(&self, doc: &CredentialDocument) -> Option<Identity> {
        if !self.matches(doc.as_str()) {
            return None;
        }
        let end = doc.0.len() - self.suffix.len();
        Some(Identity(doc.0[self.prefix.len()..end].to_owned()))
    }
}

fn has_line_break(s: &str) -> bool {
    s.contains(|c| matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}'))
}
