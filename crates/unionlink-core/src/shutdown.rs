//! Cooperative shutdown signal checked at every suspension point.

use std::time::Duration;

use tokio::sync::watch;

use crate::error::ScanError;

/// Receiving half of the process-wide shutdown flag.
///
/// Cheap to clone. Once the sender flips the flag to `true`, every pending
/// [`sleep`](Self::sleep) returns [`ScanError::Shutdown`]. If the sender is
/// dropped without signalling, shutdown can no longer be requested and sleeps
/// simply run to completion.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Create a linked sender / receiver pair.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    /// A signal that never fires. Useful for tests and one-shot tools.
    pub fn never() -> Self {
        let (_, shutdown) = Self::channel();
        shutdown
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Return `Err(Shutdown)` if the signal has already fired.
    pub fn check(&self) -> Result<(), ScanError> {
        if self.is_triggered() {
            Err(ScanError::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Resolve once shutdown is requested.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Sender gone without signalling.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration` unless shutdown is requested first.
    pub async fn sleep(&mut self, duration: Duration) -> Result<(), ScanError> {
        self.check()?;
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.triggered() => Err(ScanError::Shutdown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_signal() {
        let mut shutdown = Shutdown::never();
        assert!(shutdown.sleep(Duration::from_secs(120)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_interrupted_by_signal() {
        let (tx, mut shutdown) = Shutdown::channel();
        let handle = tokio::spawn(async move { shutdown.sleep(Duration::from_secs(3600)).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ScanError::Shutdown)));
    }

    #[tokio::test]
    async fn check_after_signal() {
        let (tx, shutdown) = Shutdown::channel();
        assert!(shutdown.check().is_ok());
        tx.send(true).unwrap();
        assert!(shutdown.is_triggered());
        assert!(shutdown.check().is_err());
    }
}
