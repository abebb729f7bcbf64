use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{ForecastAlgorithm, ForecastPeriod, ForecastResult};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiving half of a bounded channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Events raised by the forecasting engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ForecastGenerated {
        product_id: Uuid,
        period: ForecastPeriod,
        algorithm: ForecastAlgorithm,
        predicted_quantity: u64,
        confidence_level: u8,
        reorder_quantity: u64,
        calculated_at: DateTime<Utc>,
    },
    BulkGenerationStarted {
        run_id: Uuid,
        total: usize,
    },
    BulkGenerationCompleted {
        run_id: Uuid,
        succeeded: usize,
        failed: usize,
        cancelled: bool,
    },
}

impl Event {
    pub fn forecast_generated(result: &ForecastResult) -> Self {
        Event::ForecastGenerated {
            product_id: result.product_id,
            period: result.period,
            algorithm: result.algorithm_used,
            predicted_quantity: result.predicted_quantity,
            confidence_level: result.confidence_level,
            reorder_quantity: result.recommendation.reorder_quantity,
            calculated_at: result.calculation_date,
        }
    }
}

/// Drains the channel, logging each event, until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::ForecastGenerated {
                product_id,
                period,
                algorithm,
                predicted_quantity,
                confidence_level,
                reorder_quantity,
                ..
            } => {
                if reorder_quantity > 0 {
                    warn!(
                        %product_id,
                        %period,
                        predicted_quantity,
                        reorder_quantity,
                        "Forecast demand exceeds stock; reorder recommended"
                    );
                } else {
                    info!(
                        %product_id,
                        %period,
                        %algorithm,
                        predicted_quantity,
                        confidence_level,
                        "Forecast generated"
                    );
                }
            }
            Event::BulkGenerationStarted { run_id, total } => {
                info!(%run_id, total, "Bulk forecast generation started");
            }
            Event::BulkGenerationCompleted {
                run_id,
                succeeded,
                failed,
                cancelled,
            } => {
                info!(%run_id, succeeded, failed, cancelled, "Bulk forecast generation finished");
            }
        }
    }

    info!("Event processing loop stopped");
}
