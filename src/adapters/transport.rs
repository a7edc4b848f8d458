//! Unified registry transport trait for the three remote-access strategies.
//!
//! Every strategy performs the same operations against the same key path and
//! value name; only the remote-access mechanism differs. The constants are
//! passed in by the caller so no strategy carries its own copy of the target.

use crate::domain::types::{AccessMethod, Credentials, TargetHost};
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures, uniform across strategies.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The remote side reached the host but the call itself faulted.
    #[error("remote fault: {0}")]
    RemoteFault(String),

    /// The requested transport is not compiled into this build or cannot run
    /// on this platform.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Stable classification string for automated branching.
    #[must_use]
    pub fn classification(&self) -> &'static str {
        match self {
            TransportError::Unreachable(_) => "transport/unreachable",
            TransportError::AccessDenied(_) => "transport/access-denied",
            TransportError::Timeout(_) => "transport/timeout",
            TransportError::RemoteFault(_) => "transport/remote-fault",
            TransportError::Unavailable(_) => "transport/unavailable",
        }
    }
}

/// Per-call transport settings.
///
/// Credentials are optional; without them each transport runs under the
/// ambient identity of the calling process.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Overall budget for one remote operation.
    pub timeout: Duration,
    /// Explicit credentials, when the ambient identity is not wanted.
    pub credentials: Option<Credentials>,
    /// WinRM listener port on the target.
    pub remote_port: u16,
    /// Use HTTPS for the WinRM listener.
    pub use_tls: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptions {
            timeout: Duration::from_secs(30),
            credentials: None,
            remote_port: crate::domain::constants::WINRM_HTTP_PORT,
            use_tls: false,
        }
    }
}

impl TransportOptions {
    /// Set the per-operation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set explicit credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the WinRM listener port.
    #[must_use]
    pub fn with_remote_port(mut self, port: u16) -> Self {
        self.remote_port = port;
        self
    }

    /// Use HTTPS for the WinRM listener.
    #[must_use]
    pub fn with_tls(mut self) -> Self {
        self.use_tls = true;
        self
    }
}

/// One remote-registry access strategy.
///
/// Implementations are stateless between calls and hold no cross-call
/// connection; each call acquires and releases its own remote handle within
/// its own scope.
pub trait RegistryTransport: Send + Sync {
    /// Which access method this strategy implements.
    fn method(&self) -> AccessMethod;

    /// Read the raw bytes of `value_name` under `key_path` on `host`.
    ///
    /// Returns `Ok(None)` when the value (or its key) does not exist; absence
    /// is a legitimate state, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on connection, permission, or protocol
    /// failure.
    fn read_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
    ) -> Result<Option<Vec<u8>>, TransportError>;

    /// Write `bytes` as a binary value named `value_name` under `key_path`
    /// on `host`, creating the key and value if absent.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on connection, permission, or protocol
    /// failure.
    fn write_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
        bytes: &[u8],
    ) -> Result<(), TransportError>;

    /// Remove `value_name` under `key_path` on `host`. Deleting an absent
    /// value is a success; deletion is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on connection, permission, or protocol
    /// failure.
    fn delete_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
    ) -> Result<(), TransportError>;
}

/// Select the transport strategy for `method`.
///
/// Pure dispatch: the operation semantics are identical across strategies.
/// Strategies not compiled into this build report
/// [`TransportError::Unavailable`].
///
/// # Errors
///
/// Returns [`TransportError::Unavailable`] when the strategy is missing from
/// this build, or a construction error from the strategy itself.
pub fn select_transport(
    method: AccessMethod,
    options: &TransportOptions,
) -> Result<Box<dyn RegistryTransport>, TransportError> {
    match method {
        AccessMethod::Direct => {
            #[cfg(all(windows, feature = "direct-registry"))]
            {
                Ok(Box::new(crate::adapters::direct::DirectRegistryTransport::new(
                    options.clone(),
                )))
            }
            #[cfg(not(all(windows, feature = "direct-registry")))]
            {
                Err(TransportError::Unavailable(
                    "direct registry access requires a Windows build with the 'direct-registry' feature".to_string(),
                ))
            }
        }
        AccessMethod::ManagementQuery => {
            #[cfg(all(windows, feature = "wmi-transport"))]
            {
                Ok(Box::new(crate::adapters::wmi::WmiRegistryTransport::new(
                    options.clone(),
                )))
            }
            #[cfg(not(all(windows, feature = "wmi-transport")))]
            {
                Err(TransportError::Unavailable(
                    "WMI access requires a Windows build with the 'wmi-transport' feature".to_string(),
                ))
            }
        }
        AccessMethod::RemoteExec => Ok(Box::new(
            crate::adapters::winrm::WinRmTransport::new(options.clone())?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_builder() {
        let creds = Credentials::new("svc", "pw").unwrap();
        let options = TransportOptions::default()
            .with_timeout(Duration::from_secs(5))
            .with_credentials(creds)
            .with_remote_port(5986)
            .with_tls();

        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.remote_port, 5986);
        assert!(options.use_tls);
        assert!(options.credentials.is_some());
    }

    #[test]
    fn classifications_are_stable() {
        assert_eq!(
            TransportError::Unreachable("x".into()).classification(),
            "transport/unreachable"
        );
        assert_eq!(
            TransportError::Timeout(Duration::from_secs(1)).classification(),
            "transport/timeout"
        );
        assert_eq!(
            TransportError::Unavailable("x".into()).classification(),
            "transport/unavailable"
        );
    }

    #[cfg(not(all(windows, feature = "direct-registry")))]
    #[test]
    fn missing_direct_transport_reports_unavailable() {
        let err = select_transport(AccessMethod::Direct, &TransportOptions::default())
            .err()
            .expect("direct transport is not in this build");
        assert_eq!(err.classification(), "transport/unavailable");
    }

    #[test]
    fn remote_exec_transport_is_always_available() {
        assert!(select_transport(AccessMethod::RemoteExec, &TransportOptions::default()).is_ok());
    }
}
