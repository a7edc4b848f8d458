//! Chain Resync Library
//!
//! Remote management of the Windows certificate chain-engine cache resync
//! timestamp (`ChainCacheResyncFiletime`). Supports reading, writing and
//! deleting the value on remote hosts over three interchangeable transports:
//! a direct remote-registry handle, a WMI `StdRegProv` query, and a
//! WinRM-executed command.

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod services;

pub use adapters::transport::{
    select_transport, RegistryTransport, TransportError, TransportOptions,
};
pub use domain::constants::{CONFIG_KEY_PATH, RESYNC_VALUE_NAME};
pub use domain::filetime::{DecodeError, FileTime};
pub use domain::outcome::{Operation, OperationOutcome, OperationStatus};
pub use domain::types::{AccessMethod, Credentials, HostError, TargetHost};
pub use infra::config::{ConfigManager, ToolConfig};
pub use infra::error::{ResyncError, ResyncResult};
pub use services::batch::{run_batch, run_batch_with, BatchOperation, BatchRequest};
pub use services::gateway::{GatewayError, RegistryValueGateway};
pub use services::resolver::{HostResolver, IdentityResolver};
