//! Client identity classification.

use std::fmt;

use super::policy::{BudgetPolicies, BudgetPolicy};

/// Which budget pool a client draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityClass {
    /// Anonymous client, identified by its network address
    NetworkAddress,
    /// Client presenting a credential
    Credential,
}

impl IdentityClass {
    /// Key namespace for this class. Fixed; changing it orphans every live budget.
    pub fn namespace(&self) -> &'static str {
        match self {
            IdentityClass::NetworkAddress => "addr",
            IdentityClass::Credential => "cred",
        }
    }

    /// Human-readable budget name used in denial messages.
    pub fn label(&self) -> &'static str {
        match self {
            IdentityClass::NetworkAddress => "Address",
            IdentityClass::Credential => "Credential",
        }
    }
}

impl fmt::Display for IdentityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

/// The identity a request is charged against.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity {
    pub class: IdentityClass,
    pub raw_value: String,
}

impl ClientIdentity {
    pub fn network_address(addr: impl Into<String>) -> Self {
        Self {
            class: IdentityClass::NetworkAddress,
            raw_value: addr.into(),
        }
    }

    pub fn credential(credential: impl Into<String>) -> Self {
        Self {
            class: IdentityClass::Credential,
            raw_value: credential.into(),
        }
    }
}

// Credentials are secrets; keep them out of logs.
impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self.class {
            IdentityClass::NetworkAddress => self.raw_value.as_str(),
            IdentityClass::Credential => "<redacted>",
        };
        f.debug_struct("ClientIdentity")
            .field("class", &self.class)
            .field("raw_value", &value)
            .finish()
    }
}

/// The parts of an inbound request admission control looks at.
#[derive(Debug, Clone, Default)]
pub struct AdmissionRequest {
    /// Raw credential as presented, if any
    pub credential: Option<String>,
    /// Caller address as seen by the transport layer
    pub remote_addr: String,
}

impl AdmissionRequest {
    pub fn new(remote_addr: impl Into<String>, credential: Option<String>) -> Self {
        Self {
            credential,
            remote_addr: remote_addr.into(),
        }
    }

    /// An anonymous request from `remote_addr`.
    pub fn anonymous(remote_addr: impl Into<String>) -> Self {
        Self::new(remote_addr, None)
    }
}

/// Maps requests to identities and their budget policy.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    policies: BudgetPolicies,
}

impl IdentityResolver {
    pub fn new(policies: BudgetPolicies) -> Self {
        Self { policies }
    }

    /// Classify a request.
    ///
    /// A non-empty credential selects the credential budget; everything else
    /// falls back to the network address, which every connection has.
    pub fn resolve(&self, request: &AdmissionRequest) -> (ClientIdentity, BudgetPolicy) {
        let identity = match request.credential.as_deref() {
            Some(credential) if !credential.is_empty() => ClientIdentity::credential(credential),
            _ => ClientIdentity::network_address(request.remote_addr.as_str()),
        };
        let policy = self.policies.for_class(identity.class);
        (identity, policy)
    }

    pub fn policies(&self) -> &BudgetPolicies {
        &self.policies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(BudgetPolicies::new(
            BudgetPolicy::new(100, 3600).unwrap(),
            BudgetPolicy::new(200, 3600).unwrap(),
        ))
    }

    #[test]
    fn test_resolve_anonymous_uses_address() {
        let (identity, policy) = resolver().resolve(&AdmissionRequest::anonymous("10.0.0.1"));

        assert_eq!(identity, ClientIdentity::network_address("10.0.0.1"));
        assert_eq!(policy.limit, 100);
    }

    #[test]
    fn test_resolve_credential_wins_over_address() {
        let request = AdmissionRequest::new("10.0.0.1", Some("Bearer abc".to_string()));
        let (identity, policy) = resolver().resolve(&request);

        assert_eq!(identity.class, IdentityClass::Credential);
        assert_eq!(identity.raw_value, "Bearer abc");
        assert_eq!(policy.limit, 200);
    }

    #[test]
    fn test_resolve_empty_credential_is_anonymous() {
        let request = AdmissionRequest::new("10.0.0.2", Some(String::new()));
        let (identity, _) = resolver().resolve(&request);

        assert_eq!(identity.class, IdentityClass::NetworkAddress);
        assert_eq!(identity.raw_value, "10.0.0.2");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let identity = ClientIdentity::credential("super-secret");
        let rendered = format!("{:?}", identity);

        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_namespaces_are_distinct() {
        assert_ne!(
            IdentityClass::NetworkAddress.namespace(),
            IdentityClass::Credential.namespace()
        );
    }
}
