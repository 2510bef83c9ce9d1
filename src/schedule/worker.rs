use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::constants::DELIVERY_INTERVAL;

use super::messenger::DirectMessenger;
use super::store::ScheduledMessageStore;
use super::types::StoreError;

struct WorkerTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Background worker that scans the store once a minute and delivers due
/// messages, one at a time.
pub struct DeliveryWorker {
    store: Arc<ScheduledMessageStore>,
    messenger: Arc<dyn DirectMessenger>,
    task: Mutex<Option<WorkerTask>>,
}

impl DeliveryWorker {
    pub fn new(store: Arc<ScheduledMessageStore>, messenger: Arc<dyn DirectMessenger>) -> Self {
        Self {
            store,
            messenger,
            task: Mutex::new(None),
        }
    }

    /// Start the delivery loop. Calling this while the loop is already
    /// running is a no-op.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if let Some(existing) = task.as_ref()
            && !existing.handle.is_finished()
        {
            debug!("Delivery worker already running");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let store = self.store.clone();
        let messenger = self.messenger.clone();

        let handle = tokio::spawn(async move {
            info!("Delivery worker started");
            loop {
                tokio::select! {
                    _ = sleep(DELIVERY_INTERVAL) => {
                        if let Err(e) = run_tick(store.as_ref(), messenger.as_ref()).await {
                            error!("Delivery tick failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("Delivery worker stopped");
        });

        *task = Some(WorkerTask {
            shutdown: shutdown_tx,
            handle,
        });
    }

    /// Suppress future ticks. An in-flight delivery loop is not
    /// interrupted. Stopping a stopped worker is a no-op.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        if let Some(worker) = task.take() {
            let _ = worker.shutdown.send(true);
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }
}

/// One scan-and-deliver cycle. A failure to deliver one message never
/// aborts delivery of the rest.
async fn run_tick(
    store: &ScheduledMessageStore,
    messenger: &dyn DirectMessenger,
) -> Result<(), StoreError> {
    let due = store.pending(None).await?;
    if due.is_empty() {
        return Ok(());
    }

    info!("Delivering {} due scheduled message(s)", due.len());
    for message in due {
        match messenger
            .send_direct_message(&message.target_user_id, &message.content)
            .await
        {
            Ok(()) => {
                info!(
                    "Delivered scheduled message {} to user {}",
                    message.id, message.target_user_id
                );
                if let Err(e) = store.mark_sent(&message.id).await {
                    error!("Failed to record delivery of {}: {}", message.id, e);
                }
            }
            Err(e) => {
                warn!("Failed to deliver scheduled message {}: {}", message.id, e);
                if let Err(e) = store.mark_failed(&message.id, Some(&e.to_string())).await {
                    error!("Failed to record delivery failure of {}: {}", message.id, e);
                }
            }
        }
    }
    Ok(())
}
