//! Outbound side of the synchronizer: the registry it publishes into.

pub mod db;
pub mod handle;
pub mod hash;

use std::future::Future;
use thiserror::Error;
use shared::types::EndpointSet;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("registry is not accepting updates")]
    Closed,

    #[error("registry rejected update: {0}")]
    Rejected(String),
}

/// Anything that accepts authoritative endpoint sets.
///
/// Each call replaces everything previously published for
/// (`service`, `environment`); it is not an incremental add or remove.
/// `Ok` means the update was acknowledged.
pub trait RegistryClient {
    fn publish(
        &self,
        service: &str,
        environment: &str,
        endpoints: &EndpointSet,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};
    use shared::types::EndpointSet;
    use super::{PublishError, RegistryClient};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Publish {
        pub service: String,
        pub environment: String,
        pub endpoints: EndpointSet,
    }

    #[derive(Default)]
    struct Inner {
        publishes: Vec<Publish>,
        failing: bool,
    }

    /// Registry that records every acknowledged publish
    #[derive(Clone, Default)]
    pub struct RecordingRegistry {
        inner: Arc<Mutex<Inner>>,
    }

    impl RecordingRegistry {
        pub fn publishes(&self) -> Vec<Publish> {
            self.inner.lock().unwrap().publishes.clone()
        }

        pub fn publishes_for(&self, service: &str) -> Vec<Publish> {
            self.publishes()
                .into_iter()
                .filter(|p| p.service == service)
                .collect()
        }

        /// What the registry currently holds for a service, if anything was
        /// ever published for it
        pub fn view(&self, service: &str, environment: &str) -> Option<EndpointSet> {
            self.inner
                .lock()
                .unwrap()
                .publishes
                .iter()
                .rev()
                .find(|p| p.service == service && p.environment == environment)
                .map(|p| p.endpoints.clone())
        }

        pub fn set_failing(&self, failing: bool) {
            self.inner.lock().unwrap().failing = failing;
        }
    }

    impl RegistryClient for RecordingRegistry {
        async fn publish(
            &self,
            service: &str,
            environment: &str,
            endpoints: &EndpointSet,
        ) -> Result<(), PublishError> {
            let mut inner = self.inner.lock().unwrap();
            if inner.failing {
                return Err(PublishError::Rejected("registry unavailable".to_string()));
            }
            inner.publishes.push(Publish {
                service: service.to_string(),
                environment: environment.to_string(),
                endpoints: endpoints.clone(),
            });
            Ok(())
        }
    }
}
