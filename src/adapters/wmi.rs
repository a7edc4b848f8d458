//! WMI `StdRegProv` transport.
//!
//! Issues binary-value get/set/delete calls against the target host's
//! registry provider class in `root\default`, passing the well-known
//! `HKEY_LOCAL_MACHINE` handle constant, key path, and value name as call
//! arguments. A null `uValue` in a successful reply means "value not set".

use crate::adapters::transport::{RegistryTransport, TransportError, TransportOptions};
use crate::domain::constants::HKEY_LOCAL_MACHINE_HANDLE;
use crate::domain::types::{AccessMethod, TargetHost};
use serde::{Deserialize, Serialize};
use wmi::{COMLibrary, WMIConnection, WMIError};

/// DCOM HRESULT: the RPC server is unavailable.
const RPC_E_SERVER_UNAVAILABLE: i32 = 0x800706BAu32 as i32;
/// HRESULT: general access denied.
const E_ACCESS_DENIED: i32 = 0x80070005u32 as i32;
/// WBEM HRESULT: provider-level access denied.
const WBEM_E_ACCESS_DENIED: i32 = 0x80041003u32 as i32;

/// `StdRegProv` method return code: value or key not found.
const REG_NOT_FOUND: u32 = 2;
/// `StdRegProv` method return code: access denied.
const REG_ACCESS_DENIED: u32 = 5;

#[derive(Serialize)]
struct BinaryValueSelector {
    #[serde(rename = "hDefKey")]
    def_key: u32,
    #[serde(rename = "sSubKeyName")]
    sub_key_name: String,
    #[serde(rename = "sValueName")]
    value_name: String,
}

#[derive(Serialize)]
struct SetBinaryValueInput {
    #[serde(rename = "hDefKey")]
    def_key: u32,
    #[serde(rename = "sSubKeyName")]
    sub_key_name: String,
    #[serde(rename = "sValueName")]
    value_name: String,
    #[serde(rename = "uValue")]
    value: Vec<u8>,
}

#[derive(Serialize)]
struct CreateKeyInput {
    #[serde(rename = "hDefKey")]
    def_key: u32,
    #[serde(rename = "sSubKeyName")]
    sub_key_name: String,
}

#[derive(Deserialize)]
struct GetBinaryValueOutput {
    #[serde(rename = "ReturnValue")]
    return_value: u32,
    #[serde(rename = "uValue")]
    value: Option<Vec<u8>>,
}

#[derive(Deserialize)]
struct MethodOutput {
    #[serde(rename = "ReturnValue")]
    return_value: u32,
}

/// Strategy implementation over the WMI registry provider.
pub struct WmiRegistryTransport {
    // DCOM calls carry no per-call timeout; the caller's batch budget bounds
    // the operation instead.
    #[allow(dead_code)]
    options: TransportOptions,
}

impl WmiRegistryTransport {
    #[must_use]
    pub fn new(options: TransportOptions) -> Self {
        if options.credentials.is_some() {
            // The DCOM connection authenticates with the caller's token only.
            log::warn!("WMI transport ignores explicit credentials; using ambient identity");
        }
        WmiRegistryTransport { options }
    }

    /// Open a provider connection to `root\default` on the target.
    ///
    /// The connection is scoped to the call and released on drop.
    fn connect(&self, host: &TargetHost) -> Result<WMIConnection, TransportError> {
        let com = COMLibrary::new().map_err(|e| map_wmi_error(host, &e))?;
        let namespace = format!(r"\\{}\root\default", host.as_str());
        WMIConnection::with_namespace_path(&namespace, com)
            .map_err(|e| map_wmi_error(host, &e))
    }
}

impl RegistryTransport for WmiRegistryTransport {
    fn method(&self) -> AccessMethod {
        AccessMethod::ManagementQuery
    }

    fn read_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let connection = self.connect(host)?;
        let output: GetBinaryValueOutput = connection
            .exec_class_method(
                "StdRegProv",
                "GetBinaryValue",
                BinaryValueSelector {
                    def_key: HKEY_LOCAL_MACHINE_HANDLE,
                    sub_key_name: key_path.to_string(),
                    value_name: value_name.to_string(),
                },
            )
            .map_err(|e| map_wmi_error(host, &e))?;

        match output.return_value {
            // An absent uValue on success is "not set", not a fault.
            0 => Ok(output.value),
            REG_NOT_FOUND => Ok(None),
            REG_ACCESS_DENIED => Err(TransportError::AccessDenied(format!(
                "{host}: registry provider denied read"
            ))),
            code => Err(TransportError::RemoteFault(format!(
                "{host}: GetBinaryValue returned {code}"
            ))),
        }
    }

    fn write_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let connection = self.connect(host)?;
        // CreateKey is a no-op when the key already exists.
        let created: MethodOutput = connection
            .exec_class_method(
                "StdRegProv",
                "CreateKey",
                CreateKeyInput {
                    def_key: HKEY_LOCAL_MACHINE_HANDLE,
                    sub_key_name: key_path.to_string(),
                },
            )
            .map_err(|e| map_wmi_error(host, &e))?;
        check_return(host, "CreateKey", created.return_value)?;

        let written: MethodOutput = connection
            .exec_class_method(
                "StdRegProv",
                "SetBinaryValue",
                SetBinaryValueInput {
                    def_key: HKEY_LOCAL_MACHINE_HANDLE,
                    sub_key_name: key_path.to_string(),
                    value_name: value_name.to_string(),
                    value: bytes.to_vec(),
                },
            )
            .map_err(|e| map_wmi_error(host, &e))?;
        check_return(host, "SetBinaryValue", written.return_value)
    }

    fn delete_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
    ) -> Result<(), TransportError> {
        let connection = self.connect(host)?;
        let output: MethodOutput = connection
            .exec_class_method(
                "StdRegProv",
                "DeleteValue",
                BinaryValueSelector {
                    def_key: HKEY_LOCAL_MACHINE_HANDLE,
                    sub_key_name: key_path.to_string(),
                    value_name: value_name.to_string(),
                },
            )
            .map_err(|e| map_wmi_error(host, &e))?;

        match output.return_value {
            // Already absent: deletion is idempotent.
            0 | REG_NOT_FOUND => Ok(()),
            REG_ACCESS_DENIED => Err(TransportError::AccessDenied(format!(
                "{host}: registry provider denied delete"
            ))),
            code => Err(TransportError::RemoteFault(format!(
                "{host}: DeleteValue returned {code}"
            ))),
        }
    }
}

fn check_return(host: &TargetHost, method: &str, code: u32) -> Result<(), TransportError> {
    match code {
        0 => Ok(()),
        REG_ACCESS_DENIED => Err(TransportError::AccessDenied(format!(
            "{host}: registry provider denied {method}"
        ))),
        other => Err(TransportError::RemoteFault(format!(
            "{host}: {method} returned {other}"
        ))),
    }
}

fn map_wmi_error(host: &TargetHost, err: &WMIError) -> TransportError {
    if let WMIError::HResultError { hres } = err {
        return match *hres {
            RPC_E_SERVER_UNAVAILABLE => {
                TransportError::Unreachable(format!("{host}: DCOM endpoint unreachable"))
            }
            E_ACCESS_DENIED | WBEM_E_ACCESS_DENIED => {
                TransportError::AccessDenied(format!("{host}: WMI access denied"))
            }
            other => TransportError::RemoteFault(format!("{host}: WMI error {other:#010x}")),
        };
    }
    TransportError::RemoteFault(format!("{host}: {err}"))
}
