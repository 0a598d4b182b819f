use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

/// Notifies about user pressing Ctrl-C.
#[derive(Debug, Default)]
pub struct InterruptHandler {
    interrupted: AtomicBool,
}

impl InterruptHandler {
    /// Starts listening for Ctrl-C in the background.
    /// Must be called from within the tokio runtime.
    pub fn install() -> Arc<InterruptHandler> {
        let handler = Arc::new(InterruptHandler::default());
        let h = handler.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing early");
                h.interrupt();
            }
        });
        handler
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use super::InterruptHandler;

    #[tokio::test]
    async fn test_not_interrupted_until_told() {
        let handler = InterruptHandler::install();
        assert!(!handler.is_interrupted());
        handler.interrupt();
        assert!(handler.is_interrupted());
    }
}
