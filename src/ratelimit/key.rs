//! Window key generation.

use sha2::{Digest, Sha256};

use super::identity::{ClientIdentity, IdentityClass};

/// Default prefix placed in front of every counter key.
pub const DEFAULT_KEY_PREFIX: &str = "gatekeeper";

/// Store key for one identity's window counter.
///
/// Format: `{prefix}:{namespace}:{value}`, where the namespace is fixed per
/// identity class and credential values are replaced by their SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey(String);

impl WindowKey {
    /// Derive the key for an identity.
    pub fn for_identity(prefix: &str, identity: &ClientIdentity) -> Self {
        let value = match identity.class {
            IdentityClass::NetworkAddress => identity.raw_value.clone(),
            IdentityClass::Credential => hex::encode(Sha256::digest(identity.raw_value.as_bytes())),
        };

        Self(format!("{}:{}:{}", prefix, identity.class.namespace(), value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WindowKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
