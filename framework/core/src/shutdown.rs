use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// A one-shot stop signal that can be shared and listened to from many places.
///
/// The run as a whole has one of these, and so does every virtual user so that it can be retired
/// independently during a ramp down. Once triggered, a handle stays triggered.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.sender.send(()) {
            // Nobody is listening any more, which is normal for a virtual user that already exited.
            log::trace!("No listeners for shutdown signal: {e:?}");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe(), self.triggered.clone())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
    triggered: Arc<AtomicBool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>, triggered: Arc<AtomicBool>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            triggered,
        }
    }

    /// Point in time check if the shutdown signal has been received. If this returns true then
    /// work should stop so that the virtual user, or the run, can shut down.
    pub fn should_shutdown(&mut self) -> bool {
        if self.triggered.load(Ordering::SeqCst) {
            return true;
        }

        match self.receiver.try_lock() {
            Ok(mut guard) => match guard.try_recv() {
                Ok(_) => true,
                Err(TryRecvError::Closed) => true,
                // If the receiver is empty or lagged then we should not shutdown.
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    /// Wait for the shutdown signal to be received. It is safe to race this with another future so
    /// that the shutdown signal can be used to cancel other work in progress.
    ///
    /// Returns immediately if the signal was sent before this listener was created.
    pub async fn wait_for_shutdown(&mut self) {
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }

        match self.receiver.lock().await.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => {
                log::trace!("Shutdown handle dropped, treating as shutdown");
            }
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn listener_sees_shutdown_sent_after_creation() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        assert!(!listener.should_shutdown());
        handle.shutdown();
        assert!(listener.should_shutdown());
    }

    #[test]
    fn late_listener_sees_earlier_shutdown() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let mut listener = handle.new_listener();
        assert!(listener.should_shutdown());
        assert!(handle.is_shutdown());
    }

    #[test]
    fn repeated_shutdown_is_harmless() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        handle.shutdown();
        handle.shutdown();

        assert!(listener.should_shutdown());
    }

    #[tokio::test]
    async fn wait_for_shutdown_wakes_up() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.shutdown();
        });

        tokio::time::timeout(Duration::from_secs(5), listener.wait_for_shutdown())
            .await
            .expect("Listener was not woken by shutdown");
    }

    #[tokio::test]
    async fn wait_for_shutdown_returns_when_already_triggered() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let mut listener = handle.new_listener();
        tokio::time::timeout(Duration::from_millis(100), listener.wait_for_shutdown())
            .await
            .expect("Listener should return straight away");
    }
}
