use super::processor::BatchProcessor;
use super::quarantine::QuarantineRouter;
use crate::{
    error::{DriverError, ProcessError},
    flow::{
        context::InvocationMetadata,
        source::{BatchAck, BatchSource},
    },
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Counters of a [`StreamDriver::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub batches: usize,
    pub records: usize,
    pub failed_records: usize,
    pub quarantined: usize,
}

/// Feeds the batches of a [`BatchSource`] through a [`BatchProcessor`].
pub struct StreamDriver {
    processor: Arc<BatchProcessor>,
    quarantine: Option<QuarantineRouter>,
}

impl StreamDriver {
    #[must_use]
    pub const fn new(processor: Arc<BatchProcessor>) -> Self {
        Self {
            processor,
            quarantine: None,
        }
    }

    /// Routes per-record failures to an error stream instead of rejecting
    /// the batch.
    #[must_use]
    pub fn with_quarantine(mut self, quarantine: QuarantineRouter) -> Self {
        self.quarantine = Some(quarantine);
        self
    }

    fn ack(feedback: &flume::Sender<BatchAck>, ack: BatchAck) {
        if let Err(e) = feedback.send(ack) {
            error!("Failed to send feedback: {}", e);
        }
    }

    /// Processes batches until the source closes or `shutdown` fires.
    ///
    /// A batch with per-record failures is acknowledged once every failure
    /// has been quarantined; without a quarantine router, or when the
    /// quarantine pipeline fails on some of them, it is rejected and the
    /// driver moves on. Fatal errors reject the batch and stop the driver.
    ///
    /// # Errors
    ///
    /// Source errors and fatal processing errors.
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        source: &dyn BatchSource,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<DriverReport, DriverError> {
        info!("Starting stream driver");
        let output = source.stream().await?;
        let mut report = DriverReport::default();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    warn!("Received shutdown signal");
                    break;
                }
                item = output.receiver.recv_async() => {
                    match item {
                        Ok(Ok(batch)) => {
                            let partition_id = batch.partition_id.clone();
                            let records = batch.records.len();
                            let invocation = InvocationMetadata::default()
                                .with_request_id(format!("{partition_id}-{}", report.batches));

                            match self.processor.process(batch, invocation.clone()).await {
                                Ok(_) => {
                                    Self::ack(&output.feedback, BatchAck::Committed { partition_id, records });
                                }
                                Err(ProcessError::Processing(failures)) => {
                                    report.failed_records += failures.len();
                                    match &self.quarantine {
                                        Some(quarantine) => {
                                            let context = self.processor.context(partition_id.clone(), invocation);
                                            match quarantine.route(&failures, &context).await {
                                                Ok(routed) => {
                                                    report.quarantined += routed;
                                                    Self::ack(&output.feedback, BatchAck::Committed { partition_id, records });
                                                }
                                                Err(ProcessError::Processing(unrouted)) => {
                                                    warn!("{unrouted} in quarantine: rejecting batch");
                                                    Self::ack(&output.feedback, BatchAck::Rejected { partition_id, reason: unrouted.to_string() });
                                                }
                                                Err(e) => {
                                                    error!("Quarantine failed: {e}");
                                                    Self::ack(&output.feedback, BatchAck::Rejected { partition_id, reason: e.to_string() });
                                                    return Err(e.into());
                                                }
                                            }
                                        }
                                        None => {
                                            warn!("{failures}: rejecting batch");
                                            Self::ack(&output.feedback, BatchAck::Rejected { partition_id, reason: failures.to_string() });
                                        }
                                    }
                                }
                                Err(e) => {
                                    error!("Processing error: {e}");
                                    Self::ack(&output.feedback, BatchAck::Rejected { partition_id, reason: e.to_string() });
                                    return Err(e.into());
                                }
                            }
                            report.batches += 1;
                            report.records += records;
                        }
                        Ok(Err(e)) => {
                            error!("Source error: {e}");
                            return Err(e.into());
                        }
                        Err(_) => {
                            debug!("Source channel closed");
                            break;
                        }
                    }
                }
            }
        }

        info!(
            "Stream driver stopped after {} batches ({} records, {} failed)",
            report.batches, report.records, report.failed_records
        );
        Ok(report)
    }
}
