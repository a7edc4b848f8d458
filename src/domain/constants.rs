//! Registry target constants shared by every transport strategy.
//! Keep this intentionally small; the key path and value name are fixed
//! properties of the certificate chain engine and are never parameterized.

/// Registry subkey holding the chain-engine configuration, relative to
/// `HKEY_LOCAL_MACHINE`. Casing and the trailing backslash match what the
/// chain engine itself reads.
pub const CONFIG_KEY_PATH: &str =
    r"SOFTWARE\Microsoft\Cryptography\OID\EncodingType 0\CertDllCreateCertificateChainEngine\Config\";

/// Name of the REG_BINARY value carrying the resync FILETIME.
pub const RESYNC_VALUE_NAME: &str = "ChainCacheResyncFiletime";

/// `HKEY_LOCAL_MACHINE` as the uint32 handle constant used by the WMI
/// `StdRegProv` provider (2147483650).
pub const HKEY_LOCAL_MACHINE_HANDLE: u32 = 0x8000_0002;

/// Default WinRM HTTP listener port.
pub const WINRM_HTTP_PORT: u16 = 5985;

/// Default WinRM HTTPS listener port.
pub const WINRM_HTTPS_PORT: u16 = 5986;
