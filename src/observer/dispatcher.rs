// Fire-and-forget side effects.
//
// Handlers enqueue events without waiting; one worker task runs the matching
// observers in registration order, each under its own deadline. Failures are
// logged and dropped.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::database::DocumentStore;
use crate::observer::error::ObserverError;
use crate::observer::implementations::{ActivityObserver, NotificationObserver, UsageObserver};
use crate::observer::traits::{Observer, ObserverEvent};

enum Envelope {
    Event(ObserverEvent),
    /// Acknowledged once every earlier event has been handled
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct ObserverDispatcher {
    sender: mpsc::UnboundedSender<Envelope>,
}

impl ObserverDispatcher {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn start(observers: Vec<Arc<dyn Observer>>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run(observers, receiver));
        Self { sender }
    }

    /// The standard observer set over the platform database
    pub fn for_platform(platform: Arc<dyn DocumentStore>, config: Arc<AppConfig>) -> Self {
        Self::start(vec![
            Arc::new(UsageObserver::new(platform.clone(), config)),
            Arc::new(ActivityObserver::new(platform.clone())),
            Arc::new(NotificationObserver::new(platform)),
        ])
    }

    pub fn emit(&self, event: ObserverEvent) {
        if self.sender.send(Envelope::Event(event)).is_err() {
            warn!("Observer worker is gone, dropping event");
        }
    }

    /// Wait until everything emitted so far has been processed
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(Envelope::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

async fn run(observers: Vec<Arc<dyn Observer>>, mut receiver: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = receiver.recv().await {
        match envelope {
            Envelope::Event(event) => dispatch(&observers, &event).await,
            Envelope::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Observer worker stopped");
}

async fn dispatch(observers: &[Arc<dyn Observer>], event: &ObserverEvent) {
    let kind = event.kind();
    for observer in observers.iter().filter(|o| o.applies_to(kind)) {
        let outcome = timeout(observer.timeout(), observer.execute(event))
            .await
            .unwrap_or_else(|_| Err(ObserverError::Timeout(observer.timeout())));
        if let Err(e) = outcome {
            warn!("Observer {} failed on {:?}: {}", observer.name(), kind, e);
        }
    }
}
