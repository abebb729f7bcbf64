use serde::Serialize;
use uuid::Uuid;

use crate::models::ForecastPeriod;

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    /// A history, stock or catalog collaborator failed or returned malformed data.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::InvalidInput(format!("malformed JSON: {}", err))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::DataUnavailable(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ServiceError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ServiceError::Timeout(err.to_string())
    }
}

impl ServiceError {
    /// Wraps a collaborator failure for a given product.
    pub fn data_unavailable(product_id: Uuid, detail: impl std::fmt::Display) -> Self {
        ServiceError::DataUnavailable(format!("product {}: {}", product_id, detail))
    }

    pub fn forecast_not_found(product_id: Uuid, period: ForecastPeriod) -> Self {
        ServiceError::NotFound(format!(
            "no stored {} forecast for product {}",
            period, product_id
        ))
    }

    /// Errors worth retrying later: the data may come back.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable(_) | Self::Timeout(_) | Self::PersistenceError(_)
        )
    }

    /// Short, stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable(_) => "data_unavailable",
            Self::Timeout(_) => "timeout",
            Self::PersistenceError(_) => "persistence",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) | Self::InvalidInput(_) => "invalid",
            Self::EventError(_) => "event",
            Self::InternalError(_) | Self::Other(_) => "internal",
        }
    }
}

// Result extensions for easier error handling
pub trait ResultExt<T> {
    fn map_err_to_service(self) -> Result<T, ServiceError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<ServiceError>,
{
    fn map_err_to_service(self) -> Result<T, ServiceError> {
        self.map_err(|e| e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn transient_errors() {
        assert!(ServiceError::DataUnavailable("x".into()).is_transient());
        assert!(ServiceError::Timeout("x".into()).is_transient());
        assert!(ServiceError::PersistenceError("x".into()).is_transient());
        assert!(!ServiceError::ValidationError("x".into()).is_transient());
        assert!(!ServiceError::InternalError("x".into()).is_transient());
    }

    #[test]
    fn kinds_are_stable_labels() {
        assert_eq!(ServiceError::DataUnavailable("x".into()).kind(), "data_unavailable");
        assert_eq!(ServiceError::InvalidInput("x".into()).kind(), "invalid");
        assert_eq!(ServiceError::Other(anyhow::anyhow!("boom")).kind(), "internal");
    }

    #[test]
    fn data_unavailable_mentions_product() {
        let id = Uuid::nil();
        let err = ServiceError::data_unavailable(id, "connection refused");
        assert_eq!(
            err.to_string(),
            format!("Data unavailable: product {}: connection refused", id)
        );
    }

    #[tokio::test]
    async fn elapsed_converts_to_timeout() {
        let elapsed = tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        let err: ServiceError = elapsed.into();
        assert!(matches!(err, ServiceError::Timeout(_)));
    }

    #[test]
    fn result_ext_maps_anyhow() {
        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("boom"));
        assert!(matches!(result.map_err_to_service(), Err(ServiceError::Other(_))));
    }
}
