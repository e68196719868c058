use std::future::Future;

use plateau_sweep_core::prelude::{ShutdownHandle, ShutdownSignalError};

use crate::types::SweepResult;

#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown_handle
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Note that the future will be dropped if shutdown is requested, and the call then fails with
    /// [ShutdownSignalError]. Only submit futures that are safe to drop at any await point.
    pub fn execute_in_place<T>(&self, fut: impl Future<Output = SweepResult<T>>) -> SweepResult<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Run async code in place, blocking until it completes even if shutdown is requested.
    ///
    /// For cleanup that must not be cut short, and for work that watches for shutdown itself so it
    /// can wind down in an orderly way.
    pub fn execute_to_completion<T>(&self, fut: impl Future<Output = T>) -> T {
        self.runtime.block_on(fut)
    }
}
