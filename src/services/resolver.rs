//! Host-name resolution seam.
//!
//! The original tool accepts either a plain host name or a directory object
//! and reduces both to a connectable name. That reduction is a collaborator,
//! not core logic; the trait keeps the seam explicit and the default
//! implementation handles the plain-string case.

use crate::domain::types::{HostError, TargetHost};

/// Maps an arbitrary caller-supplied identifier to a validated target host.
pub trait HostResolver: Send + Sync {
    /// Resolve `identifier` to a connectable host.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when the identifier cannot name a usable remote
    /// host.
    fn resolve(&self, identifier: &str) -> Result<TargetHost, HostError>;
}

/// Resolver for plain host-name strings; trims and validates only.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityResolver;

impl HostResolver for IdentityResolver {
    fn resolve(&self, identifier: &str) -> Result<TargetHost, HostError> {
        TargetHost::new(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_resolve() {
        let resolver = IdentityResolver;
        assert_eq!(
            resolver.resolve("  ca01.contoso.com ").unwrap().as_str(),
            "ca01.contoso.com"
        );
    }

    #[test]
    fn local_aliases_fail_resolution() {
        let resolver = IdentityResolver;
        assert!(matches!(
            resolver.resolve("localhost"),
            Err(HostError::LocalTarget(_))
        ));
    }
}
