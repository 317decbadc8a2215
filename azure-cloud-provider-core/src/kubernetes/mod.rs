use std::{future::Future, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::resources::{kinds::ManagedKind, Controller, ResourceKey, ResourceSpec};

pub mod collector;
pub mod operations;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "details", rename_all = "kebab-case")]
pub enum ClusterError {
    #[error("The cluster didn't respond within {:?}!", .0)]
    Timeout(Duration),
    #[error("The cluster is unavailable! Reason: {}", .0)]
    Unavailable(String),
    #[error("The resource was modified concurrently! Reason: {}", .0)]
    Conflict(String),
    #[error("The cluster rejected the request ({code})! Reason: {message}")]
    Rejected { code: u16, message: String },
    #[error("The resource doesn't exist!")]
    NotFound,
    #[error("'{}' is not a managed kind!", .0)]
    UnknownKind(String),
    #[error("Couldn't read the resource! Reason: {}", .0)]
    InvalidObject(String),
}

impl ClusterError {
    /// Whether retrying the same request later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClusterError::Timeout(_) | ClusterError::Unavailable(_) | ClusterError::Conflict(_)
        )
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, ClusterError::Rejected { code: 401 | 403, .. })
    }
}

impl From<kube::Error> for ClusterError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) => match response.code {
                404 => ClusterError::NotFound,
                409 => ClusterError::Conflict(response.message),
                429 | 500..=599 => ClusterError::Unavailable(response.message),
                code => ClusterError::Rejected {
                    code,
                    message: response.message,
                },
            },
            kube::Error::Auth(err) => ClusterError::Rejected {
                code: 401,
                message: err.to_string(),
            },
            kube::Error::SerdeError(err) => ClusterError::InvalidObject(err.to_string()),
            other => ClusterError::Unavailable(other.to_string()),
        }
    }
}

/// The slice of the Kubernetes API the engine needs. Bodies are plain JSON objects.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Every object of a kind carrying the ownership labels of the controller.
    async fn list(&self, kind: &'static ManagedKind, controller: Controller) -> Result<Vec<Value>, ClusterError>;

    async fn get(&self, key: &ResourceKey) -> Result<Option<Value>, ClusterError>;

    async fn create(&self, spec: &ResourceSpec) -> Result<(), ClusterError>;

    async fn update(&self, spec: &ResourceSpec) -> Result<(), ClusterError>;

    /// Fails with [`ClusterError::NotFound`] when the object is already gone.
    async fn delete(&self, key: &ResourceKey) -> Result<(), ClusterError>;
}

/// Bounds a cluster call, turning an elapsed deadline into [`ClusterError::Timeout`].
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, ClusterError>
where
    F: Future<Output = Result<T, ClusterError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(ClusterError::Timeout(timeout)))
}

#[cfg(test)]
mod tests {
    use kube::core::ErrorResponse;

    use super::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_owned(),
            message: format!("status {code}"),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn api_errors_are_classified() {
        assert_eq!(ClusterError::from(api_error(404)), ClusterError::NotFound);
        assert!(ClusterError::from(api_error(409)).is_transient());
        assert!(ClusterError::from(api_error(429)).is_transient());
        assert!(ClusterError::from(api_error(503)).is_transient());

        let forbidden = ClusterError::from(api_error(403));
        assert!(!forbidden.is_transient());
        assert!(forbidden.is_forbidden());

        assert!(!ClusterError::from(api_error(422)).is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_call_times_out() {
        let timeout = Duration::from_secs(30);
        let result: Result<(), _> = with_timeout(timeout, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(ClusterError::Timeout(timeout)));
        assert!(result.unwrap_err().is_transient());
    }
}
