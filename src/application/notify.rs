use crate::domain::notification::{Notification, Recipients};
use crate::domain::ports::{Notifier, NotifierRef};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;

/// Fire-and-forget front of the notification channel.
///
/// Delivery runs on a spawned task; a failure is logged and never reaches
/// the caller, so it cannot undo a status change that was already written.
/// Spawned tasks are tracked so `drain` can wait for them at shutdown.
#[derive(Clone)]
pub struct Dispatcher {
    notifier: NotifierRef,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl Dispatcher {
    pub fn new(notifier: NotifierRef) -> Self {
        Self {
            notifier,
            tasks: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub fn dispatch(&self, notification: Notification) {
        let notifier = self.notifier.clone();
        let mut tasks = self.tasks();
        while let Some(finished) = tasks.try_join_next() {
            log_aborted(finished);
        }
        tasks.spawn(async move {
            let payment_id = notification.payment_id;
            if let Err(e) = notifier.notify(notification).await {
                tracing::warn!(payment_id, error = %e, "notification failed");
            }
        });
    }

    /// Waits until every dispatched notification has been attempted.
    pub async fn drain(&self) {
        loop {
            let mut pending = std::mem::take(&mut *self.tasks());
            if pending.is_empty() {
                return;
            }
            while let Some(finished) = pending.join_next().await {
                log_aborted(finished);
            }
        }
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn log_aborted(finished: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        tracing::warn!(error = %e, "notification task did not complete");
    }
}

/// Notifier that only logs; used when no mail service is wired in.
#[derive(Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        let recipients = match &notification.recipients {
            Recipients::Contractor => "contractor".to_string(),
            Recipients::Approvers(emails) => emails
                .iter()
                .map(|e| e.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        };
        tracing::info!(
            payment_id = notification.payment_id,
            status = %notification.status,
            reason = notification.rejection_reason.as_deref().unwrap_or(""),
            %recipients,
            "notification sent"
        );
        Ok(())
    }
}
