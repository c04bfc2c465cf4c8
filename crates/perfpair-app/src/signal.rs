//! Run-scoped cancellation.

use tokio::sync::watch;

/// Sending half; owned by the run.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Receiving half; cheap to clone into every task of the run.
#[derive(Debug, Clone)]
pub struct RunSignal {
    rx: watch::Receiver<bool>,
}

pub fn run_signal() -> (CancelHandle, RunSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, RunSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> RunSignal {
        RunSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl RunSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the run is cancelled. Never resolves if the run ends
    /// without cancelling.
    pub async fn cancelled(&mut self) {
        let closed = self.rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
