use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::{QueueError, WorkQueue};

/// Publisher with bounded exponential backoff. When the retry budget runs
/// out the message is dropped and the error returned; a later bulk scan
/// is the recovery mechanism for dropped filesystem events.
pub struct Publisher {
    queue: Arc<dyn WorkQueue>,
    max_retries: u32,
    base_backoff: Duration,
}

impl Publisher {
    pub fn new(queue: Arc<dyn WorkQueue>, max_retries: u32, base_backoff_ms: u64) -> Self {
        Self {
            queue,
            max_retries,
            base_backoff: Duration::from_millis(base_backoff_ms),
        }
    }

    pub async fn publish_with_retry(
        &self,
        queue_name: &str,
        payload: Vec<u8>,
    ) -> Result<(), QueueError> {
        let mut last_err = QueueError::Closed;
        for attempt in 1..=self.max_retries.max(1) {
            match self.queue.publish(queue_name, payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        queue = queue_name,
                        attempt,
                        max = self.max_retries,
                        error = %e,
                        "publish failed"
                    );
                    last_err = e;
                }
            }
            if attempt < self.max_retries {
                tokio::time::sleep(self.base_backoff * 2u32.saturating_pow(attempt - 1)).await;
                if let Err(e) = self.queue.reconnect().await {
                    warn!(error = %e, "reconnect failed");
                }
            }
        }
        error!(queue = queue_name, "publish retries exhausted, message dropped");
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryQueue;

    #[tokio::test]
    async fn publishes_on_first_attempt() {
        let queue = Arc::new(MemoryQueue::new());
        let publisher = Publisher::new(queue.clone(), 3, 1);
        publisher
            .publish_with_retry("q", b"payload".to_vec())
            .await
            .unwrap();

        let mut consumer = queue.consume("q", "t").await.unwrap();
        let delivery = consumer.next().await.unwrap().unwrap();
        assert_eq!(delivery.payload(), b"payload");
    }
}
