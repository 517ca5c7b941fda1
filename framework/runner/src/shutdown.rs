use tokio::signal;

pub(crate) use surge_core::prelude::{
    DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError,
};

/// Trigger the returned handle when the operator presses Ctrl-C.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime) -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, shutting down...");
                listener_handle.shutdown();
            }
            Err(e) => {
                log::error!("Failed to listen for Ctrl-C, the run can only stop on its own: {e:?}");
            }
        }
    });

    handle
}
