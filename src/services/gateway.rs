//! Registry value gateway.
//!
//! One uniform get/set/delete contract over the fixed chain-engine registry
//! value, executed through whichever transport strategy the caller selected.
//! The gateway is stateless and reentrant; it holds no connection between
//! calls.

use crate::adapters::transport::{
    select_transport, RegistryTransport, TransportError, TransportOptions,
};
use crate::domain::constants::{CONFIG_KEY_PATH, RESYNC_VALUE_NAME};
use crate::domain::filetime::{DecodeError, FileTime};
use crate::domain::types::{AccessMethod, TargetHost};
use thiserror::Error;

/// Failures of one gateway call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The transport delivered bytes, but they are not a valid FILETIME.
    /// Stored data is corrupt; distinct from any transport failure.
    #[error("stored value is malformed: {0}")]
    Malformed(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl GatewayError {
    /// Stable classification string for automated branching.
    #[must_use]
    pub fn classification(&self) -> &'static str {
        match self {
            GatewayError::Malformed(_) => "malformed",
            GatewayError::Transport(e) => e.classification(),
        }
    }
}

/// Gateway over the fixed registry value on a remote host.
pub struct RegistryValueGateway {
    transport: Box<dyn RegistryTransport>,
}

impl RegistryValueGateway {
    /// Wrap an explicit transport strategy (also the seam for test doubles).
    #[must_use]
    pub fn new(transport: Box<dyn RegistryTransport>) -> Self {
        RegistryValueGateway { transport }
    }

    /// Select the strategy for `method` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] when the strategy is unavailable
    /// in this build or fails to construct.
    pub fn with_method(
        method: AccessMethod,
        options: &TransportOptions,
    ) -> Result<Self, GatewayError> {
        Ok(RegistryValueGateway {
            transport: select_transport(method, options)?,
        })
    }

    /// The access method of the wrapped strategy.
    #[must_use]
    pub fn method(&self) -> AccessMethod {
        self.transport.method()
    }

    /// Read the resync timestamp from `host`.
    ///
    /// `Ok(None)` means no override is configured on the host; absence is a
    /// legitimate state, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Malformed`] for undecodable stored bytes and
    /// [`GatewayError::Transport`] for remote-access failures.
    pub fn get(&self, host: &TargetHost) -> Result<Option<FileTime>, GatewayError> {
        log::debug!("reading {RESYNC_VALUE_NAME} on {host} via {}", self.method());
        match self
            .transport
            .read_value(host, CONFIG_KEY_PATH, RESYNC_VALUE_NAME)?
        {
            None => Ok(None),
            Some(bytes) => Ok(Some(FileTime::from_bytes(&bytes)?)),
        }
    }

    /// Write `timestamp` as the resync value on `host`, creating the key and
    /// value if absent. Idempotent: the stored bytes depend only on the
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] for remote-access failures.
    pub fn set(&self, host: &TargetHost, timestamp: FileTime) -> Result<(), GatewayError> {
        log::debug!(
            "writing {RESYNC_VALUE_NAME}={timestamp} on {host} via {}",
            self.method()
        );
        self.transport
            .write_value(host, CONFIG_KEY_PATH, RESYNC_VALUE_NAME, &timestamp.to_bytes())?;
        Ok(())
    }

    /// Remove the resync value from `host`. A no-op success when the value is
    /// already absent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] for remote-access failures.
    pub fn delete(&self, host: &TargetHost) -> Result<(), GatewayError> {
        log::debug!(
            "deleting {RESYNC_VALUE_NAME} on {host} via {}",
            self.method()
        );
        self.transport
            .delete_value(host, CONFIG_KEY_PATH, RESYNC_VALUE_NAME)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory transport double over a shared backing store, so two
    /// instances tagged with different methods can see the same registry.
    struct MemoryTransport {
        method: AccessMethod,
        store: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
    }

    impl MemoryTransport {
        fn shared(method: AccessMethod) -> (Self, Arc<Mutex<HashMap<(String, String), Vec<u8>>>>) {
            let store = Arc::new(Mutex::new(HashMap::new()));
            (
                MemoryTransport {
                    method,
                    store: store.clone(),
                },
                store,
            )
        }

        fn with_store(
            method: AccessMethod,
            store: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
        ) -> Self {
            MemoryTransport { method, store }
        }
    }

    impl RegistryTransport for MemoryTransport {
        fn method(&self) -> AccessMethod {
            self.method
        }

        fn read_value(
            &self,
            host: &TargetHost,
            _key_path: &str,
            value_name: &str,
        ) -> Result<Option<Vec<u8>>, TransportError> {
            let store = self.store.lock().unwrap();
            Ok(store
                .get(&(host.as_str().to_string(), value_name.to_string()))
                .cloned())
        }

        fn write_value(
            &self,
            host: &TargetHost,
            _key_path: &str,
            value_name: &str,
            bytes: &[u8],
        ) -> Result<(), TransportError> {
            let mut store = self.store.lock().unwrap();
            store.insert(
                (host.as_str().to_string(), value_name.to_string()),
                bytes.to_vec(),
            );
            Ok(())
        }

        fn delete_value(
            &self,
            host: &TargetHost,
            _key_path: &str,
            value_name: &str,
        ) -> Result<(), TransportError> {
            let mut store = self.store.lock().unwrap();
            store.remove(&(host.as_str().to_string(), value_name.to_string()));
            Ok(())
        }
    }

    /// Transport double that fails every call with a fixed error.
    struct FailingTransport;

    impl RegistryTransport for FailingTransport {
        fn method(&self) -> AccessMethod {
            AccessMethod::Direct
        }

        fn read_value(
            &self,
            host: &TargetHost,
            _key_path: &str,
            _value_name: &str,
        ) -> Result<Option<Vec<u8>>, TransportError> {
            Err(TransportError::Unreachable(host.as_str().to_string()))
        }

        fn write_value(
            &self,
            host: &TargetHost,
            _key_path: &str,
            _value_name: &str,
            _bytes: &[u8],
        ) -> Result<(), TransportError> {
            Err(TransportError::AccessDenied(host.as_str().to_string()))
        }

        fn delete_value(
            &self,
            host: &TargetHost,
            _key_path: &str,
            _value_name: &str,
        ) -> Result<(), TransportError> {
            Err(TransportError::Unreachable(host.as_str().to_string()))
        }
    }

    fn host() -> TargetHost {
        TargetHost::new("ca01").unwrap()
    }

    #[test]
    fn get_on_unset_value_is_none_not_error() {
        let (transport, _) = MemoryTransport::shared(AccessMethod::ManagementQuery);
        let gateway = RegistryValueGateway::new(Box::new(transport));
        assert!(gateway.get(&host()).unwrap().is_none());
    }

    #[test]
    fn set_then_get_is_tick_exact_for_every_method() {
        for method in [
            AccessMethod::Direct,
            AccessMethod::ManagementQuery,
            AccessMethod::RemoteExec,
        ] {
            let (transport, _) = MemoryTransport::shared(method);
            let gateway = RegistryValueGateway::new(Box::new(transport));
            let ft = FileTime::from_ticks(132_539_328_001_234_567);
            gateway.set(&host(), ft).unwrap();
            assert_eq!(gateway.get(&host()).unwrap(), Some(ft), "via {method}");
            // Setting the same value again leaves the same stored bytes.
            gateway.set(&host(), ft).unwrap();
            assert_eq!(gateway.get(&host()).unwrap(), Some(ft), "via {method}");
        }
    }

    #[test]
    fn delete_is_idempotent() {
        let (transport, store) = MemoryTransport::shared(AccessMethod::ManagementQuery);
        let gateway = RegistryValueGateway::new(Box::new(transport));
        let ft = FileTime::from_ticks(7);
        gateway.set(&host(), ft).unwrap();

        gateway.delete(&host()).unwrap();
        assert!(store.lock().unwrap().is_empty());
        // Second delete against the already-absent value still succeeds.
        gateway.delete(&host()).unwrap();
        assert!(store.lock().unwrap().is_empty());
        assert!(gateway.get(&host()).unwrap().is_none());
    }

    #[test]
    fn malformed_stored_bytes_are_a_data_error() {
        let (transport, store) = MemoryTransport::shared(AccessMethod::ManagementQuery);
        store.lock().unwrap().insert(
            ("ca01".to_string(), RESYNC_VALUE_NAME.to_string()),
            vec![1, 2, 3],
        );
        let gateway = RegistryValueGateway::new(Box::new(transport));
        let err = gateway.get(&host()).unwrap_err();
        assert_eq!(err.classification(), "malformed");
    }

    #[test]
    fn value_written_via_one_method_reads_identically_via_another() {
        let (writer_transport, store) = MemoryTransport::shared(AccessMethod::Direct);
        let writer = RegistryValueGateway::new(Box::new(writer_transport));
        let ft = FileTime::from_ticks(0x00ab_cdef_0123_4567);
        writer.set(&host(), ft).unwrap();

        for method in [AccessMethod::ManagementQuery, AccessMethod::RemoteExec] {
            let reader = RegistryValueGateway::new(Box::new(MemoryTransport::with_store(
                method,
                store.clone(),
            )));
            assert_eq!(reader.get(&host()).unwrap(), Some(ft), "via {method}");
        }
    }

    #[test]
    fn transport_failures_keep_their_classification() {
        let gateway = RegistryValueGateway::new(Box::new(FailingTransport));
        assert_eq!(
            gateway.get(&host()).unwrap_err().classification(),
            "transport/unreachable"
        );
        assert_eq!(
            gateway
                .set(&host(), FileTime::from_ticks(1))
                .unwrap_err()
                .classification(),
            "transport/access-denied"
        );
    }
}
