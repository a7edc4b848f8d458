//! Direct remote-registry transport.
//!
//! Opens a handle to the target's `HKEY_LOCAL_MACHINE` hive via
//! `RegConnectRegistryW` and performs the read/write/delete against the open
//! subkey handle. Runs under the ambient identity of the calling process;
//! the remote registry service has no per-call credential parameter.

use crate::adapters::transport::{RegistryTransport, TransportError, TransportOptions};
use crate::domain::types::{AccessMethod, TargetHost};
use std::ffi::OsStr;
use std::io;
use std::os::windows::ffi::OsStrExt;
use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_BAD_NETPATH, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS,
};
use windows_sys::Win32::System::Registry::{RegConnectRegistryW, HKEY, HKEY_LOCAL_MACHINE};
use winreg::enums::{RegType, KEY_READ, KEY_SET_VALUE};
use winreg::{RegKey, RegValue};

/// RPC error raised when the remote registry service cannot be reached.
const RPC_S_SERVER_UNAVAILABLE: u32 = 1722;

/// Strategy implementation over a direct remote-registry handle.
pub struct DirectRegistryTransport {
    // The registry API offers no per-call timeout; the caller's batch budget
    // bounds the operation instead.
    #[allow(dead_code)]
    options: TransportOptions,
}

impl DirectRegistryTransport {
    #[must_use]
    pub fn new(options: TransportOptions) -> Self {
        if options.credentials.is_some() {
            // RegConnectRegistry authenticates with the caller's token only.
            log::warn!(
                "direct registry transport ignores explicit credentials; using ambient identity"
            );
        }
        DirectRegistryTransport { options }
    }

    /// Connect to the remote `HKEY_LOCAL_MACHINE` hive.
    ///
    /// The returned key owns the connection handle and releases it on drop.
    fn connect_hklm(&self, host: &TargetHost) -> Result<RegKey, TransportError> {
        let machine: Vec<u16> = OsStr::new(&format!(r"\\{}", host.as_str()))
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let mut remote: HKEY = 0;
        let rc =
            unsafe { RegConnectRegistryW(machine.as_ptr(), HKEY_LOCAL_MACHINE, &mut remote) };
        if rc != ERROR_SUCCESS {
            return Err(map_os_error(host, rc));
        }
        Ok(RegKey::predef(remote))
    }
}

impl RegistryTransport for DirectRegistryTransport {
    fn method(&self) -> AccessMethod {
        AccessMethod::Direct
    }

    fn read_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let hklm = self.connect_hklm(host)?;
        let key = match hklm.open_subkey_with_flags(key_path, KEY_READ) {
            Ok(key) => key,
            // No config key means no value configured.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(map_io_error(host, &e)),
        };
        match key.get_raw_value(value_name) {
            Ok(value) => Ok(Some(value.bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io_error(host, &e)),
        }
    }

    fn write_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let hklm = self.connect_hklm(host)?;
        let (key, _disposition) = hklm
            .create_subkey(key_path)
            .map_err(|e| map_io_error(host, &e))?;
        let value = RegValue {
            bytes: bytes.to_vec(),
            vtype: RegType::REG_BINARY,
        };
        key.set_raw_value(value_name, &value)
            .map_err(|e| map_io_error(host, &e))
    }

    fn delete_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
    ) -> Result<(), TransportError> {
        let hklm = self.connect_hklm(host)?;
        let key = match hklm.open_subkey_with_flags(key_path, KEY_SET_VALUE) {
            Ok(key) => key,
            // Absent key: the value is already gone.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(map_io_error(host, &e)),
        };
        match key.delete_value(value_name) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io_error(host, &e)),
        }
    }
}

fn map_os_error(host: &TargetHost, code: u32) -> TransportError {
    match code {
        ERROR_ACCESS_DENIED => {
            TransportError::AccessDenied(format!("{host}: registry access denied"))
        }
        ERROR_BAD_NETPATH | RPC_S_SERVER_UNAVAILABLE => {
            TransportError::Unreachable(format!("{host}: remote registry service unreachable"))
        }
        ERROR_FILE_NOT_FOUND => {
            TransportError::RemoteFault(format!("{host}: registry hive not found"))
        }
        other => TransportError::RemoteFault(format!("{host}: registry error {other}")),
    }
}

fn map_io_error(host: &TargetHost, err: &io::Error) -> TransportError {
    match err.raw_os_error() {
        Some(code) if code >= 0 => map_os_error(host, code as u32),
        _ if err.kind() == io::ErrorKind::PermissionDenied => {
            TransportError::AccessDenied(format!("{host}: {err}"))
        }
        _ => TransportError::RemoteFault(format!("{host}: {err}")),
    }
}
