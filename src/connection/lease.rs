//! Counted borrows of the pool handle.
//!
//! # Responsibilities
//! - Hand callers a clone of the pool handle
//! - Track in-flight operations for the drain phase
//! - Apply operation timeouts and forced-shutdown cancellation
//! - Route "connection lost" failures to the reconnect path

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::connection::error::{ConnectionError, OperationError};

/// Manager-side hooks a lease reports to.
pub(crate) trait LeaseOwner: Send + Sync {
    fn release(&self);
    fn operation_timeout(&self) -> Duration;
    fn forced(&self) -> &CancellationToken;
    fn record_error(&self, error: &ConnectionError);
    /// Report a failure on the pool installed as `generation`.
    fn connection_lost(self: Arc<Self>, generation: u64, reason: String);
}

/// RAII guard over the pool handle. Dropping it ends the in-flight operation.
pub struct Lease<H> {
    handle: H,
    /// Which installed pool `handle` belongs to.
    generation: u64,
    owner: Arc<dyn LeaseOwner>,
}

impl<H: Clone> Lease<H> {
    /// The caller must already have counted this lease as in flight.
    pub(crate) fn new(handle: H, generation: u64, owner: Arc<dyn LeaseOwner>) -> Self {
        Self {
            handle,
            generation,
            owner,
        }
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run `op` under the manager's default operation timeout.
    pub async fn run<F, Fut, T>(&self, op: F) -> Result<T, ConnectionError>
    where
        F: FnOnce(H) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        self.run_with_timeout(self.owner.operation_timeout(), op).await
    }

    /// Run `op` with an explicit deadline.
    ///
    /// A forced shutdown cancels the operation with `ShuttingDown`.
    pub async fn run_with_timeout<F, Fut, T>(
        &self,
        limit: Duration,
        op: F,
    ) -> Result<T, ConnectionError>
    where
        F: FnOnce(H) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let operation = op(self.handle.clone());

        let result = tokio::select! {
            biased;
            _ = self.owner.forced().cancelled() => Err(ConnectionError::ShuttingDown),
            outcome = tokio::time::timeout(limit, operation) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(OperationError::ConnectionLost(reason))) => {
                    Arc::clone(&self.owner).connection_lost(self.generation, reason.clone());
                    Err(ConnectionError::ConnectionLost(reason))
                }
                Ok(Err(OperationError::Failed(message))) => {
                    Err(ConnectionError::Operation(message))
                }
                Err(_) => Err(ConnectionError::OperationTimeout(limit)),
            },
        };

        if let Err(ref e) = result {
            self.owner.record_error(e);
        }
        result
    }
}

impl<H> Deref for Lease<H> {
    type Target = H;
    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<H> Drop for Lease<H> {
    fn drop(&mut self) {
        self.owner.release();
    }
}

impl<H> std::fmt::Debug for Lease<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
