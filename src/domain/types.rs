//! Type-safe wrappers using the new-type pattern.
//!
//! Validated inputs for remote registry operations: target host names,
//! access-method selection, and optional per-call credentials.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from validating a target host identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("target host cannot be empty")]
    Empty,

    #[error("invalid target host name: {0}")]
    InvalidName(String),

    /// The identifier resolves to the local machine. The direct transport
    /// cannot open a remote handle to the machine it runs on, so local
    /// targets are refused uniformly instead of producing misleading results.
    #[error("'{0}' refers to the local machine, which is not a supported target; run against a remote host")]
    LocalTarget(String),
}

/// A validated remote host name.
///
/// Construction enforces the local-host guard: identifiers naming the local
/// machine are rejected with [`HostError::LocalTarget`] before any transport
/// is reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetHost(String);

impl TargetHost {
    /// Create a new `TargetHost` after validation.
    ///
    /// Leading UNC backslashes (`\\server`) are stripped. The remainder must
    /// be a plain host name or address: no whitespace, no path separators.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] for empty, malformed, or local-machine input.
    pub fn new(host: impl AsRef<str>) -> Result<Self, HostError> {
        let raw = host.as_ref().trim();
        let name = raw.trim_start_matches('\\');

        if name.is_empty() {
            return Err(HostError::Empty);
        }
        if name
            .chars()
            .any(|c| c.is_whitespace() || c == '\\' || c == '/')
        {
            return Err(HostError::InvalidName(name.to_string()));
        }
        if Self::names_local_machine(name) {
            return Err(HostError::LocalTarget(name.to_string()));
        }

        Ok(TargetHost(name.to_string()))
    }

    /// Get the host name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `name` is a textual alias for the machine this process runs on.
    fn names_local_machine(name: &str) -> bool {
        const LOCAL_ALIASES: &[&str] = &["localhost", "127.0.0.1", "::1", "."];
        if LOCAL_ALIASES.iter().any(|a| name.eq_ignore_ascii_case(a)) {
            return true;
        }
        // COMPUTERNAME on Windows, HOSTNAME on most Unix shells.
        for var in ["COMPUTERNAME", "HOSTNAME"] {
            if let Ok(own) = std::env::var(var) {
                if !own.is_empty() && name.eq_ignore_ascii_case(own.trim()) {
                    return true;
                }
            }
        }
        false
    }
}

impl FromStr for TargetHost {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for TargetHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which remote-access transport executes an operation.
///
/// Orthogonal to the operation itself; the three strategies are
/// interchangeable behind [`crate::adapters::transport::RegistryTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMethod {
    /// Direct remote-registry handle (`RegConnectRegistry`).
    Direct,
    /// WMI `StdRegProv` binary-value methods.
    ManagementQuery,
    /// WinRM-executed command on the target host.
    RemoteExec,
}

impl AccessMethod {
    /// Stable lowercase identifier, also accepted by [`FromStr`].
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMethod::Direct => "direct",
            AccessMethod::ManagementQuery => "wmi",
            AccessMethod::RemoteExec => "winrm",
        }
    }
}

impl Default for AccessMethod {
    fn default() -> Self {
        AccessMethod::ManagementQuery
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" | "registry" => Ok(AccessMethod::Direct),
            "wmi" | "management" => Ok(AccessMethod::ManagementQuery),
            "winrm" | "remote" | "exec" => Ok(AccessMethod::RemoteExec),
            other => Err(format!(
                "unknown access method '{other}' (expected direct, wmi, or winrm)"
            )),
        }
    }
}

/// Optional per-call credentials for a transport.
///
/// When absent, transports run under the ambient identity of the calling
/// process.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl Credentials {
    /// Create a credential pair. The user name must be non-empty.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Result<Self, HostError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(HostError::InvalidName("credential user name".to_string()));
        }
        Ok(Credentials {
            username,
            secret: secret.into(),
        })
    }

    /// The user name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The secret, for handing to a transport's authentication layer.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// Redact the secret in all formatted output to avoid accidental logging.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [secret redacted]", self.username)
    }
}
