// Forecast orchestration
pub mod bulk_generation;
pub mod forecasting;

pub use bulk_generation::{
    BatchFailure, BatchFailureReason, BatchProgress, BatchReport, BulkGenerationRequest,
    BulkRunControl, CancellationFlag, ProgressCallback, ProgressTracker,
};
pub use forecasting::ForecastingService;
