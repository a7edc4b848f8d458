//! Adapter layer modules for remote host access.
//!
//! Provides the transport strategies behind the registry gateway:
//! - Direct remote-registry handle (Windows builds, feature `direct-registry`)
//! - WMI `StdRegProv` binary-value methods (Windows builds, feature `wmi-transport`)
//! - WinRM-executed command over WS-Management (all platforms)

#[cfg(all(windows, feature = "direct-registry"))]
pub mod direct;
pub mod transport;
#[cfg(all(windows, feature = "wmi-transport"))]
pub mod wmi;
pub mod winrm;
