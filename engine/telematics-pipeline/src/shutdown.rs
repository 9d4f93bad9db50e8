// Shutdown coordination for pipeline tasks

use crate::config::ShutdownConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Broadcasts a one-way stop signal to producer and processor tasks
#[derive(Debug)]
pub struct ShutdownManager {
    config: ShutdownConfig,
    signal: watch::Sender<bool>,
    shutdown_completed: AtomicBool,
}

/// Task-side handle that resolves once shutdown is requested
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownManager {
    pub fn new(config: ShutdownConfig) -> Self {
        let (signal, _) = watch::channel(false);
        Self { config, signal, shutdown_completed: AtomicBool::new(false) }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener { receiver: self.signal.subscribe() }
    }

    pub fn initiate_shutdown(&self) {
        self.signal.send_replace(true);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.signal.borrow()
    }

    pub fn complete_shutdown(&self) {
        self.shutdown_completed.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown_completed(&self) -> bool {
        self.shutdown_completed.load(Ordering::Relaxed)
    }

    pub fn get_shutdown_timeout(&self) -> Duration {
        self.config.shutdown_timeout()
    }
}

impl ShutdownListener {
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once shutdown has been requested (immediately if it already was)
    pub async fn wait(&mut self) {
        // A dropped manager also counts as shutdown.
        let _ = self.receiver.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_lifecycle() {
        let manager = ShutdownManager::new(ShutdownConfig::default());
        let listener = manager.subscribe();

        assert!(!manager.is_shutdown_requested());
        assert!(!listener.is_triggered());
        assert!(!manager.is_shutdown_completed());

        manager.initiate_shutdown();
        assert!(manager.is_shutdown_requested());
        assert!(listener.is_triggered());
        assert!(!manager.is_shutdown_completed());

        manager.complete_shutdown();
        assert!(manager.is_shutdown_completed());
    }

    #[test]
    fn test_shutdown_timeout() {
        let manager = ShutdownManager::new(ShutdownConfig { shutdown_timeout_ms: 250 });
        assert_eq!(manager.get_shutdown_timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_listener_wakes() {
        let manager = ShutdownManager::new(ShutdownConfig::default());
        let mut listener = manager.subscribe();

        let waiter = tokio::spawn(async move { listener.wait().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        manager.initiate_shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_shutdown() {
        let manager = ShutdownManager::new(ShutdownConfig::default());
        manager.initiate_shutdown();

        let mut listener = manager.subscribe();
        tokio::time::timeout(Duration::from_millis(100), listener.wait()).await.unwrap();
    }
}
