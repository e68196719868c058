use std::sync::Arc;

use tokio::sync::watch;

/// Shared switch used to ask a running sweep to stop.
///
/// Once [ShutdownHandle::shutdown] has been called the request is sticky: listeners created
/// afterwards observe it immediately, so a sweep that starts a new level after an interrupt still
/// sees that it must stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(watch::channel(false).0),
        }
    }

    /// Request shutdown. Calling this more than once has no further effect.
    pub fn shutdown(&self) {
        let was_requested = self.sender.send_replace(true);
        if !was_requested {
            log::debug!("Shutdown requested");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: watch::Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check if shutdown has been requested. If this returns true then work should
    /// be wound down so that the sweep can clean up and exit.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until shutdown is requested. It is safe to race this with another future so that the
    /// shutdown request can be used to cancel other work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        if self.receiver.wait_for(|requested| *requested).await.is_err() {
            // The handle is gone without ever requesting shutdown, so nothing can arrive now.
            std::future::pending::<()>().await;
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
            msg: "Sweep cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_should_not_shutdown_by_default() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();

        assert!(!handle.is_shutdown());
        assert!(!listener.should_shutdown());
    }

    #[test]
    fn test_should_see_shutdown_requested_before_listener_was_created() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let listener = handle.new_listener();
        assert!(listener.should_shutdown());
    }

    #[test]
    fn test_should_stay_shutdown_after_repeated_requests() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();

        handle.shutdown();
        handle.shutdown();

        assert!(listener.should_shutdown());
        assert!(listener.clone().should_shutdown());
    }

    #[tokio::test]
    async fn test_should_wake_waiting_listener() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.shutdown();
        });

        tokio::time::timeout(Duration::from_secs(5), listener.wait_for_shutdown())
            .await
            .expect("listener was not woken by shutdown");
    }

    #[test]
    fn test_should_describe_cancellation() {
        assert_eq!(
            ShutdownSignalError::default().to_string(),
            "Sweep cancelled by shutdown signal"
        );
    }
}
