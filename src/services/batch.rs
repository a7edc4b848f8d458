//! Per-host batch runner.
//!
//! Hosts are independent: the batch fans out one blocking gateway call per
//! host on the runtime's blocking pool, bounds the number in flight with a
//! semaphore, and always produces exactly one outcome per host. A failing
//! host never aborts the rest of the batch.

use crate::adapters::transport::{
    select_transport, RegistryTransport, TransportError, TransportOptions,
};
use crate::domain::filetime::FileTime;
use crate::domain::outcome::{Operation, OperationOutcome};
use crate::domain::types::{AccessMethod, TargetHost};
use crate::services::gateway::{GatewayError, RegistryValueGateway};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// The logical operation a batch applies to every host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Get,
    Set(FileTime),
    Delete,
}

impl BatchOperation {
    fn operation(&self) -> Operation {
        match self {
            BatchOperation::Get => Operation::Get,
            BatchOperation::Set(_) => Operation::Set,
            BatchOperation::Delete => Operation::Delete,
        }
    }
}

/// One batch of per-host work.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub hosts: Vec<TargetHost>,
    pub operation: BatchOperation,
    pub method: AccessMethod,
    pub options: TransportOptions,
    /// Upper bound on simultaneously in-flight hosts.
    pub max_parallel: usize,
}

impl BatchRequest {
    /// A batch with the default concurrency bound.
    #[must_use]
    pub fn new(
        hosts: Vec<TargetHost>,
        operation: BatchOperation,
        method: AccessMethod,
        options: TransportOptions,
    ) -> Self {
        BatchRequest {
            hosts,
            operation,
            method,
            options,
            max_parallel: 8,
        }
    }
}

/// Creates one transport per host call; the seam that lets tests substitute
/// an in-memory strategy for the real ones.
pub trait TransportFactory: Send + Sync {
    /// Build a transport for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the strategy is unavailable or fails
    /// to construct.
    fn create(&self, method: AccessMethod) -> Result<Box<dyn RegistryTransport>, TransportError>;
}

/// Production factory backed by [`select_transport`].
pub struct DefaultTransportFactory {
    options: TransportOptions,
}

impl DefaultTransportFactory {
    #[must_use]
    pub fn new(options: TransportOptions) -> Self {
        DefaultTransportFactory { options }
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn create(&self, method: AccessMethod) -> Result<Box<dyn RegistryTransport>, TransportError> {
        select_transport(method, &self.options)
    }
}

/// Run `request` against every host and collect one outcome per host, in
/// input order.
pub async fn run_batch(request: BatchRequest) -> Vec<OperationOutcome> {
    let factory = Arc::new(DefaultTransportFactory::new(request.options.clone()));
    run_batch_with(request, factory).await
}

/// [`run_batch`] with an explicit transport factory.
pub async fn run_batch_with(
    request: BatchRequest,
    factory: Arc<dyn TransportFactory>,
) -> Vec<OperationOutcome> {
    let semaphore = Arc::new(Semaphore::new(request.max_parallel.max(1)));
    let operation = request.operation;
    let method = request.method;
    let timeout = request.options.timeout;

    let mut handles = Vec::with_capacity(request.hosts.len());
    for host in request.hosts {
        let semaphore = Arc::clone(&semaphore);
        let factory = Arc::clone(&factory);
        let host_name = host.as_str().to_string();
        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed while the batch runs; treat a
                // closed semaphore as a cancelled batch.
                Err(_) => {
                    return OperationOutcome::failed(
                        host.as_str(),
                        method,
                        operation.operation(),
                        "transport/remote-fault",
                        "batch cancelled before dispatch",
                    )
                }
            };

            let blocking_host = host.clone();
            let work = tokio::task::spawn_blocking(move || {
                execute_one(&blocking_host, operation, method, factory.as_ref())
            });
            match tokio::time::timeout(timeout, work).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join_error)) => OperationOutcome::failed(
                    host.as_str(),
                    method,
                    operation.operation(),
                    "transport/remote-fault",
                    format!("worker failed: {join_error}"),
                ),
                // The blocking call is abandoned, not interrupted; its thread
                // finishes in the background while the outcome reports the
                // timeout.
                Err(_elapsed) => OperationOutcome::failed(
                    host.as_str(),
                    method,
                    operation.operation(),
                    TransportError::Timeout(timeout).classification(),
                    TransportError::Timeout(timeout).to_string(),
                ),
            }
        });
        handles.push((host_name, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (host_name, handle) in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(join_error) => outcomes.push(OperationOutcome::failed(
                host_name,
                method,
                operation.operation(),
                "transport/remote-fault",
                format!("worker failed: {join_error}"),
            )),
        }
    }
    outcomes
}

/// One blocking gateway call against one host.
fn execute_one(
    host: &TargetHost,
    operation: BatchOperation,
    method: AccessMethod,
    factory: &dyn TransportFactory,
) -> OperationOutcome {
    let transport = match factory.create(method) {
        Ok(transport) => transport,
        Err(e) => {
            return OperationOutcome::failed(
                host.as_str(),
                method,
                operation.operation(),
                e.classification(),
                e.to_string(),
            )
        }
    };
    let gateway = RegistryValueGateway::new(transport);

    let result: Result<Option<FileTime>, GatewayError> = match operation {
        BatchOperation::Get => gateway.get(host),
        BatchOperation::Set(timestamp) => gateway.set(host, timestamp).map(|()| Some(timestamp)),
        BatchOperation::Delete => gateway.delete(host).map(|()| None),
    };

    match result {
        Ok(filetime) => {
            OperationOutcome::complete(host.as_str(), method, operation.operation(), filetime)
        }
        Err(e) => OperationOutcome::failed(
            host.as_str(),
            method,
            operation.operation(),
            e.classification(),
            e.to_string(),
        ),
    }
}
