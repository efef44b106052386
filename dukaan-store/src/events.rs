use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use dukaan_core::events::{
    EventPublisher, TOPIC_ORDER_PLACED, TOPIC_ORDER_STATUS_CHANGED, TOPIC_PAYMENT_RECEIVED,
};
use dukaan_core::CoreError;
use dukaan_shared::models::events::{OrderPlacedEvent, OrderStatusChangedEvent, PaymentReceivedEvent};

fn encode<T: Serialize>(event: &T) -> Result<String, CoreError> {
    serde_json::to_string(event).map_err(|e| CoreError::PublishError(e.to_string()))
}

/// Publisher used when no broker is configured: events go to the log.
#[derive(Clone, Default)]
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish_order_placed(&self, event: &OrderPlacedEvent) -> Result<(), CoreError> {
        info!(topic = TOPIC_ORDER_PLACED, order = %event.order_number, payload = %encode(event)?, "event");
        Ok(())
    }

    async fn publish_status_changed(&self, event: &OrderStatusChangedEvent) -> Result<(), CoreError> {
        info!(topic = TOPIC_ORDER_STATUS_CHANGED, order_id = %event.order_id, payload = %encode(event)?, "event");
        Ok(())
    }

    async fn publish_payment_received(&self, event: &PaymentReceivedEvent) -> Result<(), CoreError> {
        info!(topic = TOPIC_PAYMENT_RECEIVED, order_id = %event.order_id, payload = %encode(event)?, "event");
        Ok(())
    }
}

#[cfg(feature = "kafka")]
mod kafka {
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    use std::time::Duration;
    use tracing::{error, info};

    use super::*;

    #[derive(Clone)]
    pub struct EventProducer {
        producer: FutureProducer,
    }

    impl EventProducer {
        pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", "5000")
                .create()?;

            Ok(Self { producer })
        }

        pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
            let record = FutureRecord::to(topic).key(key).payload(payload);

            match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => {
                    info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                    Ok(())
                }
                Err((e, _msg)) => {
                    error!("Failed to send message to {}: {}", topic, e);
                    Err(e)
                }
            }
        }
    }

    /// Orders are keyed by order id so one order's events stay on one partition.
    pub struct KafkaEventPublisher {
        producer: EventProducer,
    }

    impl KafkaEventPublisher {
        pub fn new(producer: EventProducer) -> Self {
            Self { producer }
        }

        async fn send<T: Serialize + Sync>(&self, topic: &str, key: &str, event: &T) -> Result<(), CoreError> {
            let payload = encode(event)?;
            self.producer
                .publish(topic, key, &payload)
                .await
                .map_err(|e| CoreError::PublishError(e.to_string()))
        }
    }

    #[async_trait]
    impl EventPublisher for KafkaEventPublisher {
        async fn publish_order_placed(&self, event: &OrderPlacedEvent) -> Result<(), CoreError> {
            self.send(TOPIC_ORDER_PLACED, &event.order_id.to_string(), event).await
        }

        async fn publish_status_changed(&self, event: &OrderStatusChangedEvent) -> Result<(), CoreError> {
            self.send(TOPIC_ORDER_STATUS_CHANGED, &event.order_id.to_string(), event).await
        }

        async fn publish_payment_received(&self, event: &PaymentReceivedEvent) -> Result<(), CoreError> {
            self.send(TOPIC_PAYMENT_RECEIVED, &event.order_id.to_string(), event).await
        }
    }
}

#[cfg(feature = "kafka")]
pub use kafka::{EventProducer, KafkaEventPublisher};
