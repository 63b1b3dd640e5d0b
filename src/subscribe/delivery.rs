//! Delivery loop feeding inbound payloads to the transformer.
//!
//! This is the adapter between a broker subscription and
//! [`MetricTransformer`]: it runs one invocation per delivery, reports the
//! outcome through `tracing`, and never propagates a failure back to the
//! transport.

use std::sync::Arc;

use avail_adapters::Deliveries;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{MetricTransformer, Outcome, TransformError};

/// How a single delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Published,
    SkippedEmpty,
    NoDestination,
    Failed,
}

/// Counts of delivery outcomes over the lifetime of a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    pub received: u64,
    pub published: u64,
    pub skipped_empty: u64,
    pub no_destination: u64,
    pub failed: u64,
}

impl DeliverySummary {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Published => self.published += 1,
            DeliveryOutcome::SkippedEmpty => self.skipped_empty += 1,
            DeliveryOutcome::NoDestination => self.no_destination += 1,
            DeliveryOutcome::Failed => self.failed += 1,
        }
    }
}

/// Log the result of one invocation and classify it.
///
/// Missing destinations are warnings; everything else that went wrong is an
/// error. Nothing is escalated.
pub fn report(result: &Result<Outcome, TransformError>) -> DeliveryOutcome {
    match result {
        Ok(Outcome::Published(batch)) => {
            debug!(
                records = batch.len(),
                down = batch.down_count(),
                "Availability batch published"
            );
            DeliveryOutcome::Published
        }
        Ok(Outcome::SkippedEmpty) => DeliveryOutcome::SkippedEmpty,
        Err(TransformError::NoOutboundDestination(destination)) => {
            warn!(destination = %destination, "No outbound destination available, batch dropped");
            DeliveryOutcome::NoDestination
        }
        Err(e) => {
            error!(error = %e, "Failed to process metric batch");
            DeliveryOutcome::Failed
        }
    }
}

/// Consume `deliveries` until the channel closes or `shutdown` fires.
///
/// At most `concurrency` invocations run at a time (a value of 0 is treated
/// as 1). On shutdown the channel is closed and every delivery already
/// buffered is still processed. In-flight invocations are awaited before
/// returning.
pub async fn run_deliveries(
    mut deliveries: Deliveries,
    transformer: Arc<MetricTransformer>,
    concurrency: usize,
    shutdown: CancellationToken,
) -> DeliverySummary {
    let limit = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut in_flight = JoinSet::new();
    let mut summary = DeliverySummary::default();
    let mut draining = false;

    info!(concurrency = concurrency.max(1), "Starting delivery loop");

    loop {
        let payload = tokio::select! {
            biased;

            _ = shutdown.cancelled(), if !draining => {
                info!("Received shutdown signal, draining buffered deliveries");
                deliveries.close();
                draining = true;
                continue;
            }
            payload = deliveries.recv() => match payload {
                Some(payload) => payload,
                None => {
                    info!("Delivery channel closed, stopping delivery loop");
                    break;
                }
            },
        };

        summary.received += 1;

        let Ok(permit) = limit.clone().acquire_owned().await else {
            break;
        };
        let transformer = transformer.clone();

        in_flight.spawn(async move {
            let result = transformer.process_bytes(&payload).await;
            drop(permit);
            report(&result)
        });

        while let Some(finished) = in_flight.try_join_next() {
            collect(&mut summary, finished);
        }
    }

    while let Some(finished) = in_flight.join_next().await {
        collect(&mut summary, finished);
    }

    info!(
        received = summary.received,
        published = summary.published,
        skipped_empty = summary.skipped_empty,
        no_destination = summary.no_destination,
        failed = summary.failed,
        "Delivery loop stopped"
    );

    summary
}

fn collect(
    summary: &mut DeliverySummary,
    finished: Result<DeliveryOutcome, tokio::task::JoinError>,
) {
    match finished {
        Ok(outcome) => summary.record(outcome),
        Err(e) => {
            error!(error = %e, "Invocation task aborted");
            summary.record(DeliveryOutcome::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avail_adapters::AdapterError;
    use avail_types::AvailBatch;

    #[test]
    fn test_report_classification() {
        assert_eq!(
            report(&Ok(Outcome::Published(AvailBatch::new()))),
            DeliveryOutcome::Published
        );
        assert_eq!(
            report(&Ok(Outcome::SkippedEmpty)),
            DeliveryOutcome::SkippedEmpty
        );
        assert_eq!(
            report(&Err(TransformError::NoOutboundDestination("avail".to_string()))),
            DeliveryOutcome::NoDestination
        );
        assert_eq!(
            report(&Err(TransformError::MalformedPayload("eof".to_string()))),
            DeliveryOutcome::Failed
        );
        assert_eq!(
            report(&Err(TransformError::PublishFailure(AdapterError::Publish(
                "down".to_string()
            )))),
            DeliveryOutcome::Failed
        );
    }

    #[test]
    fn test_summary_record() {
        let mut summary = DeliverySummary::default();
        summary.record(DeliveryOutcome::Published);
        summary.record(DeliveryOutcome::Failed);
        summary.record(DeliveryOutcome::Failed);

        assert_eq!(summary.published, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.no_destination, 0);
    }
}
