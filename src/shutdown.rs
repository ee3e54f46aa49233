//! Shutdown signalling shared by the background tasks and the listener

use tokio::sync::watch;

/// Guard for managing task lifecycles
///
/// Every receiver handed out by [`ShutdownHandle::subscribe`] observes the
/// shutdown request. Dropping the handle counts as a shutdown request too.
pub struct ShutdownHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { shutdown_tx: tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown(&self) {
        // Stored even with no live receivers, so later subscribers see it.
        self.shutdown_tx.send_replace(true);
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once shutdown is requested or the handle is gone
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_reaches_every_subscriber() {
        let handle = ShutdownHandle::new();
        let mut first = handle.subscribe();
        let mut second = handle.subscribe();

        handle.shutdown();

        tokio::time::timeout(Duration::from_secs(1), async {
            wait_for_shutdown(&mut first).await;
            wait_for_shutdown(&mut second).await;
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_after_shutdown_sees_it() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let mut late = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(&mut late))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_handle_releases_waiters() {
        let handle = ShutdownHandle::new();
        let mut rx = handle.subscribe();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_shutdown_keeps_waiting() {
        let handle = ShutdownHandle::new();
        let mut rx = handle.subscribe();

        let waited =
            tokio::time::timeout(Duration::from_millis(50), wait_for_shutdown(&mut rx)).await;
        assert!(waited.is_err());
    }
}
