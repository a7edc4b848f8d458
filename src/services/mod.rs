//! Service layer module root.
//! Contains the registry gateway, the per-host batch runner, and the
//! host-name resolver seam.

pub mod batch;
pub mod gateway;
pub mod resolver;

pub use batch::{run_batch, run_batch_with, BatchOperation, BatchRequest, TransportFactory};
pub use gateway::{GatewayError, RegistryValueGateway};
pub use resolver::{HostResolver, IdentityResolver};
