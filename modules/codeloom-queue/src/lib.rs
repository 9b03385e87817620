//! Durable work-queue abstraction.
//!
//! The broker is the only coordination medium between pipeline workers, so
//! the trait is deliberately small: declare, publish, consume, with
//! per-delivery ack / nack-requeue / reject. Production runs on RabbitMQ
//! via [`AmqpQueue`]; integration tests run the same workers against
//! [`MemoryQueue`].

mod amqp;
mod memory;
mod publisher;

pub use amqp::AmqpQueue;
pub use memory::MemoryQueue;
pub use publisher::Publisher;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("queue {0} already has a consumer")]
    AlreadyConsumed(String),

    #[error("queue connection closed")]
    Closed,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Idempotently declare a durable queue.
    async fn declare(&self, queue: &str) -> Result<(), QueueError>;

    /// Publish one persistent JSON message.
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), QueueError>;

    /// Start consuming with prefetch 1. Each delivery must be acked,
    /// nack-requeued, or rejected.
    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<JobConsumer, QueueError>;

    /// Re-establish the broker connection after a failure. Backends
    /// without a remote connection have nothing to do.
    async fn reconnect(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Stream of deliveries from one queue.
pub enum JobConsumer {
    Amqp(lapin::Consumer),
    Memory(memory::MemoryConsumer),
}

impl JobConsumer {
    /// Next delivery; `None` when the queue is closed.
    pub async fn next(&mut self) -> Option<Result<JobDelivery, QueueError>> {
        match self {
            JobConsumer::Amqp(consumer) => {
                use futures::StreamExt;
                let delivery = consumer.next().await?;
                Some(delivery.map(JobDelivery::from_amqp).map_err(QueueError::from))
            }
            JobConsumer::Memory(consumer) => consumer.next().await.map(Ok),
        }
    }
}

/// One in-flight message plus its acknowledgement handle.
pub struct JobDelivery {
    payload: Vec<u8>,
    ack: AckHandle,
}

enum AckHandle {
    Amqp(lapin::acker::Acker),
    Memory(memory::MemoryAck),
}

impl JobDelivery {
    fn from_amqp(delivery: lapin::message::Delivery) -> Self {
        Self {
            payload: delivery.data,
            ack: AckHandle::Amqp(delivery.acker),
        }
    }

    pub(crate) fn from_memory(payload: Vec<u8>, ack: memory::MemoryAck) -> Self {
        Self {
            payload,
            ack: AckHandle::Memory(ack),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Acknowledge successful processing.
    pub async fn ack(self) -> Result<(), QueueError> {
        match self.ack {
            AckHandle::Amqp(acker) => {
                acker.ack(lapin::options::BasicAckOptions::default()).await?;
            }
            AckHandle::Memory(_) => {}
        }
        Ok(())
    }

    /// Negative-acknowledge and put the message back on the queue.
    pub async fn nack_requeue(self) -> Result<(), QueueError> {
        match self.ack {
            AckHandle::Amqp(acker) => {
                acker
                    .nack(lapin::options::BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await?;
            }
            AckHandle::Memory(ack) => ack.requeue(self.payload),
        }
        Ok(())
    }

    /// Negative-acknowledge without requeue. Used for messages that can
    /// never be processed (malformed JSON), so they cannot poison the
    /// queue.
    pub async fn reject(self) -> Result<(), QueueError> {
        match self.ack {
            AckHandle::Amqp(acker) => {
                acker
                    .nack(lapin::options::BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    })
                    .await?;
            }
            AckHandle::Memory(_) => {}
        }
        Ok(())
    }
}
