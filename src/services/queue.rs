use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::ReviewPayload;
use crate::services::notifier::SubscriberNotifier;

#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub id: Uuid,
    pub form_id: String,
    pub review: ReviewPayload,
}

/// Producer side of the background notification queue.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<NotificationJob>,
}

impl NotificationQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (NotificationQueue { tx }, rx)
    }

    /// Starts a worker draining the queue into `notifier`.
    pub fn start(notifier: Arc<SubscriberNotifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel(capacity);
        let handle = tokio::spawn(run_worker(rx, notifier));
        (queue, handle)
    }

    /// Never waits. A full queue hands the job to its own task instead of
    /// dropping it.
    pub fn enqueue(&self, form_id: String, review: ReviewPayload) -> Uuid {
        let job = NotificationJob {
            id: Uuid::new_v4(),
            form_id,
            review,
        };
        let id = job.id;

        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!("Notification queue full, scheduling job {} directly", job.id);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = tx.send(job).await {
                        error!("Notification job {} lost: worker stopped", e.0.id);
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                error!("Notification job {} lost: worker stopped", job.id);
            }
        }
        id
    }
}

/// Each job runs in its own task so one slow fan-out does not hold up the next.
pub async fn run_worker(mut rx: mpsc::Receiver<NotificationJob>, notifier: Arc<SubscriberNotifier>) {
    info!("Notification worker started");
    while let Some(job) = rx.recv().await {
        let notifier = notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&job.form_id, &job.review).await {
                error!("Notification job {} for form {} failed: {}", job.id, job.form_id, e);
            }
        });
    }
    info!("Notification worker stopped");
}
