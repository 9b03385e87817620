use async_trait::async_trait;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{JobConsumer, QueueError, WorkQueue};

/// RabbitMQ-backed queue. One connection and one shared channel; lapin
/// channels are safe to clone across tasks. `reconnect` replaces both
/// after the broker drops the connection, so a retrying publisher can
/// recover in place.
pub struct AmqpQueue {
    url: String,
    state: RwLock<AmqpState>,
}

struct AmqpState {
    _connection: Connection,
    channel: Channel,
}

async fn open(url: &str) -> Result<AmqpState, QueueError> {
    let connection = Connection::connect(url, ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;
    Ok(AmqpState {
        _connection: connection,
        channel,
    })
}

impl AmqpQueue {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let state = open(url).await?;
        info!("connected to AMQP broker");
        Ok(Self {
            url: url.to_string(),
            state: RwLock::new(state),
        })
    }

    async fn channel(&self) -> Channel {
        self.state.read().await.channel.clone()
    }
}

#[async_trait]
impl WorkQueue for AmqpQueue {
    async fn declare(&self, queue: &str) -> Result<(), QueueError> {
        self.channel()
            .await
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), QueueError> {
        self.channel()
            .await
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<JobConsumer, QueueError> {
        let channel = self.channel().await;
        channel.basic_qos(1, BasicQosOptions::default()).await?;
        let consumer = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(JobConsumer::Amqp(consumer))
    }

    async fn reconnect(&self) -> Result<(), QueueError> {
        warn!("re-establishing AMQP connection");
        let fresh = open(&self.url).await?;
        *self.state.write().await = fresh;
        info!("AMQP connection re-established");
        Ok(())
    }
}
