/*!
 * Resilient data pipeline
 *
 * Generate -> upload (retry + dead-letter) -> validate -> enrich -> upload
 * processed -> notify. Uploads run under the retry policy; processing runs
 * under the circuit breaker. Every failure is logged with the operation,
 * destination, and attempt count before it is converted into an outcome.
 */

use crate::config::HavocConfig;
use crate::records;
use async_trait::async_trait;
use chrono::Utc;
use havoc_core_interface::{
    CloudError, Dataset, MessageQueue, ObjectStore, QueueEvent, QueueHandle,
};
use havoc_core_resilience::{
    CircuitBreaker, DeadLetterRecord, DeadLetterSink, ResilienceError, RetryPolicy,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Publishes exhausted uploads as `UploadFailed` events on a message queue
pub struct QueueDeadLetterSink {
    queue: Arc<dyn MessageQueue>,
    handle: QueueHandle,
}

impl QueueDeadLetterSink {
    pub fn new(queue: Arc<dyn MessageQueue>, handle: QueueHandle) -> Self {
        Self { queue, handle }
    }
}

#[async_trait]
impl DeadLetterSink for QueueDeadLetterSink {
    async fn publish(&self, record: DeadLetterRecord) -> Result<(), ResilienceError> {
        let event = QueueEvent::UploadFailed {
            destination: record.destination,
            item_key: record.item_key,
            attempts: record.attempts,
            at: Utc::now(),
        };
        self.queue
            .send(&self.handle, &event)
            .await
            .map(|_| ())
            .map_err(|e| ResilienceError::Transient(e.to_string()))
    }
}

fn classify(error: CloudError) -> ResilienceError {
    match error {
        CloudError::Serialization(msg) => ResilienceError::Permanent(msg),
        CloudError::BucketMissing(b) => ResilienceError::Permanent(format!("bucket missing: {b}")),
        other => ResilienceError::Transient(other.to_string()),
    }
}

/// Result of one end-to-end pipeline run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Whether the run completed through processing
    pub succeeded: bool,
    /// Upload attempts made (1 means no retries were needed)
    pub upload_attempts: u32,
    /// Records written to the processed bucket
    pub records_processed: usize,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

/// The pipeline and the infrastructure handles it runs against
pub struct ResilientPipeline {
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn MessageQueue>,
    config: HavocConfig,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    dead_letter_queue: QueueHandle,
    notification_queue: QueueHandle,
}

impl ResilientPipeline {
    /// Create the pipeline and set up its buckets and queues
    pub async fn new(
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn MessageQueue>,
        config: HavocConfig,
    ) -> Result<Self, ResilienceError> {
        info!(
            raw = %config.raw_bucket,
            processed = %config.processed_bucket,
            "setting up pipeline infrastructure"
        );
        store
            .create_bucket(&config.raw_bucket)
            .await
            .map_err(classify)?;
        store
            .create_bucket(&config.processed_bucket)
            .await
            .map_err(classify)?;
        let dead_letter_queue = queue
            .create_queue(&config.dead_letter_queue)
            .await
            .map_err(classify)?;
        let notification_queue = queue
            .create_queue(&config.notification_queue)
            .await
            .map_err(classify)?;

        let retry = config.retry.policy();
        let breaker = CircuitBreaker::new(config.breaker.breaker_config());
        Ok(Self {
            store,
            queue,
            config,
            retry,
            breaker,
            dead_letter_queue,
            notification_queue,
        })
    }

    /// The breaker guarding processing, shared state with the pipeline
    pub fn breaker(&self) -> CircuitBreaker {
        self.breaker.clone()
    }

    /// Handle of the dead-letter queue
    pub fn dead_letter_queue(&self) -> &QueueHandle {
        &self.dead_letter_queue
    }

    /// Handle of the notification queue
    pub fn notification_queue(&self) -> &QueueHandle {
        &self.notification_queue
    }

    /// Upload a dataset under the retry policy.
    ///
    /// On exhaustion an `UploadFailed` event lands on the dead-letter queue
    /// and the outcome reports `succeeded = false`.
    pub async fn upload_with_retry(
        &self,
        data: &Dataset,
        bucket: &str,
        key: &str,
    ) -> havoc_core_resilience::RetryOutcome {
        let sink = QueueDeadLetterSink::new(self.queue.clone(), self.dead_letter_queue.clone());
        self.retry
            .run(bucket, key, &sink, |_| async {
                self.store
                    .put(bucket, key, data)
                    .await
                    .map(|()| true)
                    .map_err(classify)
            })
            .await
    }

    /// Download, validate, enrich, and re-upload one object, guarded by the
    /// circuit breaker. Returns the number of records processed.
    pub async fn process_data(&self, key: &str) -> Result<usize, ResilienceError> {
        self.breaker
            .call(|| async {
                let raw = self
                    .store
                    .get(&self.config.raw_bucket, key)
                    .await
                    .map_err(classify)?
                    .ok_or_else(|| {
                        ResilienceError::Transient(format!(
                            "object {key} not found in {}",
                            self.config.raw_bucket
                        ))
                    })?;

                records::validate(&raw)?;
                let processed = records::enrich(&raw);

                let processed_key = key.replacen("raw/", "processed/", 1);
                self.store
                    .put(&self.config.processed_bucket, &processed_key, &processed)
                    .await
                    .map_err(classify)?;

                let event = QueueEvent::DataProcessed {
                    input_key: key.to_string(),
                    output_key: processed_key.clone(),
                    record_count: processed.len(),
                    at: Utc::now(),
                };
                self.queue
                    .send(&self.notification_queue, &event)
                    .await
                    .map_err(classify)?;

                info!(key, processed_key, records = processed.len(), "data processed");
                Ok(processed.len())
            })
            .await
    }

    /// One end-to-end run: generate, upload, process
    pub async fn run_once(&self) -> RunOutcome {
        let start = Instant::now();
        let data = records::generate_sample_data(self.config.sample_size);
        let key = format!("raw/transactions_{}.json", Utc::now().format("%Y%m%d_%H%M%S_%f"));

        let upload = self
            .upload_with_retry(&data, &self.config.raw_bucket, &key)
            .await;
        if !upload.succeeded {
            error!(
                operation = "upload",
                destination = %self.config.raw_bucket,
                key,
                attempts = upload.attempt_count(),
                "pipeline run failed at upload"
            );
            return RunOutcome {
                succeeded: false,
                upload_attempts: upload.attempt_count(),
                records_processed: 0,
                duration: start.elapsed(),
            };
        }

        match self.process_data(&key).await {
            Ok(count) => RunOutcome {
                succeeded: true,
                upload_attempts: upload.attempt_count(),
                records_processed: count,
                duration: start.elapsed(),
            },
            Err(e) => {
                error!(
                    operation = "process",
                    key,
                    error = %e,
                    "pipeline run failed at processing"
                );
                RunOutcome {
                    succeeded: false,
                    upload_attempts: upload.attempt_count(),
                    records_processed: 0,
                    duration: start.elapsed(),
                }
            }
        }
    }

    /// Poll the dead-letter queue for `window`, acknowledging every message.
    /// Returns how many dead letters were drained.
    pub async fn drain_dead_letters(&self, window: Duration) -> usize {
        let deadline = Instant::now() + window;
        let poll_interval = (window / 10).max(Duration::from_millis(10));
        let mut drained = 0usize;

        while Instant::now() < deadline {
            let messages = match self.queue.receive(&self.dead_letter_queue).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(error = %e, "dead-letter queue unavailable, retrying");
                    tokio::time::sleep(poll_interval).await;
                    continue;
                }
            };

            for message in messages {
                match &message.body {
                    QueueEvent::UploadFailed {
                        destination,
                        item_key,
                        attempts,
                        at,
                    } => {
                        warn!(
                            %destination,
                            item_key,
                            attempts,
                            failed_at = %at,
                            "dead letter drained"
                        );
                    }
                    QueueEvent::NewFile { bucket, key, .. } => {
                        info!(bucket, key, "unexpected event on dead-letter queue");
                    }
                    QueueEvent::DataProcessed {
                        input_key,
                        output_key,
                        ..
                    } => {
                        info!(input_key, output_key, "unexpected event on dead-letter queue");
                    }
                }
                drained += 1;
                if let Err(e) = self
                    .queue
                    .delete(&self.dead_letter_queue, &message.receipt_handle)
                    .await
                {
                    warn!(error = %e, "failed to acknowledge dead letter");
                }
            }

            tokio::time::sleep(poll_interval.min(deadline.saturating_duration_since(Instant::now())))
                .await;
        }

        info!(drained, "dead-letter drain finished");
        drained
    }
}
