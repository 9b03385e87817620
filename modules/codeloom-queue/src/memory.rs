use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{JobConsumer, JobDelivery, QueueError, WorkQueue};

/// In-memory queue with the same ack/requeue semantics as the broker.
/// Backs integration tests; a queue supports one consumer at a time.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<Mutex<HashMap<String, MemoryChannel>>>,
}

struct MemoryChannel {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryChannel {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, queue: &str) -> mpsc::UnboundedSender<Vec<u8>> {
        let mut inner = self.inner.lock().expect("memory queue lock poisoned");
        inner
            .entry(queue.to_string())
            .or_insert_with(MemoryChannel::new)
            .tx
            .clone()
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn declare(&self, queue: &str) -> Result<(), QueueError> {
        self.sender(queue);
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), QueueError> {
        self.sender(queue).send(payload).map_err(|_| QueueError::Closed)
    }

    async fn consume(&self, queue: &str, _consumer_tag: &str) -> Result<JobConsumer, QueueError> {
        let mut inner = self.inner.lock().expect("memory queue lock poisoned");
        let channel = inner
            .entry(queue.to_string())
            .or_insert_with(MemoryChannel::new);
        let rx = channel
            .rx
            .take()
            .ok_or_else(|| QueueError::AlreadyConsumed(queue.to_string()))?;
        Ok(JobConsumer::Memory(MemoryConsumer {
            rx,
            tx: channel.tx.clone(),
        }))
    }
}

pub struct MemoryConsumer {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl MemoryConsumer {
    pub(crate) async fn next(&mut self) -> Option<JobDelivery> {
        let payload = self.rx.recv().await?;
        Some(JobDelivery::from_memory(
            payload,
            MemoryAck {
                tx: self.tx.clone(),
            },
        ))
    }
}

pub struct MemoryAck {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl MemoryAck {
    pub(crate) fn requeue(self, payload: Vec<u8>) {
        // A dropped receiver means the test is done with the queue.
        let _ = self.tx.send(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_consume_in_order() {
        let queue = MemoryQueue::new();
        queue.declare("q").await.unwrap();
        queue.publish("q", b"one".to_vec()).await.unwrap();
        queue.publish("q", b"two".to_vec()).await.unwrap();

        let mut consumer = queue.consume("q", "t").await.unwrap();
        let first = consumer.next().await.unwrap().unwrap();
        assert_eq!(first.payload(), b"one");
        first.ack().await.unwrap();

        let second = consumer.next().await.unwrap().unwrap();
        assert_eq!(second.payload(), b"two");
        second.ack().await.unwrap();
    }

    #[tokio::test]
    async fn nack_requeue_redelivers() {
        let queue = MemoryQueue::new();
        queue.publish("q", b"job".to_vec()).await.unwrap();

        let mut consumer = queue.consume("q", "t").await.unwrap();
        let delivery = consumer.next().await.unwrap().unwrap();
        delivery.nack_requeue().await.unwrap();

        let redelivered = consumer.next().await.unwrap().unwrap();
        assert_eq!(redelivered.payload(), b"job");
        redelivered.ack().await.unwrap();
    }

    #[tokio::test]
    async fn reject_drops_the_message() {
        let queue = MemoryQueue::new();
        queue.publish("q", b"poison".to_vec()).await.unwrap();
        queue.publish("q", b"good".to_vec()).await.unwrap();

        let mut consumer = queue.consume("q", "t").await.unwrap();
        consumer.next().await.unwrap().unwrap().reject().await.unwrap();

        let next = consumer.next().await.unwrap().unwrap();
        assert_eq!(next.payload(), b"good");
    }

    #[tokio::test]
    async fn second_consumer_is_refused() {
        let queue = MemoryQueue::new();
        queue.consume("q", "a").await.unwrap();
        assert!(matches!(
            queue.consume("q", "b").await,
            Err(QueueError::AlreadyConsumed(_))
        ));
    }
}
