use plateau_sweep_core::prelude::ShutdownHandle;
use tokio::signal;

/// Request shutdown of the sweep when the user presses Ctrl-C.
///
/// A second Ctrl-C is not treated specially: the orderly shutdown that follows the first one stops
/// the main load and the backend before the process exits.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime) -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                log::warn!("Received shutdown signal, stopping the sweep...");
                listener_handle.shutdown();
            }
            Err(e) => log::error!("Failed to listen for Ctrl-C, interrupts will not be handled: {e}"),
        }
    });

    handle
}
