//! Bounded concurrent delivery.
//!
//! A [`DispatchPool`] sends a batch of notifications with at most
//! `max_in_flight` encrypt-and-send operations running at once. The pool is
//! owned by the caller; there is no process-wide executor.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{PushError, Result};
use crate::notification::Notification;
use crate::transport::{PushResponse, Transport};

/// Caller-sized pool bounding concurrent sends.
#[derive(Debug, Clone)]
pub struct DispatchPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl DispatchPool {
    /// Create a pool allowing `max_in_flight` concurrent sends (minimum 1).
    pub fn new(max_in_flight: usize) -> Self {
        let size = max_in_flight.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Create a pool sized by [`Config::max_in_flight`].
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_in_flight)
    }

    /// Maximum concurrent sends.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Send every notification, returning one result per input in input
    /// order.
    ///
    /// Tasks run on the current tokio runtime. A failure in one send does
    /// not affect the others; a task that panics is reported as
    /// `PushError::Internal` for its slot.
    pub async fn send_all(
        &self,
        dispatcher: Arc<Dispatcher>,
        transport: Arc<dyn Transport>,
        notifications: Vec<Notification>,
    ) -> Vec<Result<PushResponse>> {
        let total = notifications.len();
        let mut tasks = JoinSet::new();

        for (index, notification) in notifications.into_iter().enumerate() {
            let permits = Arc::clone(&self.permits);
            let dispatcher = Arc::clone(&dispatcher);
            let transport = Arc::clone(&transport);

            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => dispatcher.send(transport.as_ref(), &notification).await,
                    Err(_) => Err(PushError::Internal("pool closed".to_string())),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<PushResponse>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => log::error!("[WebPush] Dispatch task failed: {e}"),
            }
        }

        let delivered = results
            .iter()
            .filter(|slot| matches!(slot, Some(Ok(_))))
            .count();
        log::info!("[WebPush] Batch complete: {delivered}/{total} delivered");

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(PushError::Internal("task panicked".to_string()))))
            .collect()
    }
}
