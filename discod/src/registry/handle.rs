use std::thread;
use tokio::sync::{mpsc, oneshot, watch};
use anyhow::Result;
use shared::types::{EndpointSet, ServiceRecord};
use super::db::RegistryDb;
use super::{hash, PublishError, RegistryClient};

/// Commands sent to the registry thread
pub enum RegistryCommand {
    Replace {
        service: String,
        environment: String,
        endpoints: EndpointSet,
        reply: oneshot::Sender<Result<bool>>,
    },
    GetAll(oneshot::Sender<Result<Vec<ServiceRecord>>>),
    GetByEnvironment(String, oneshot::Sender<Result<Vec<ServiceRecord>>>),
    GetOne {
        service: String,
        environment: String,
        reply: oneshot::Sender<Result<Option<ServiceRecord>>>,
    },
    Shutdown,
}

/// Handle to the registry database, which lives on its own thread
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Spawn the registry thread. `hash_tx` receives a fresh content hash
    /// after every write that changed something.
    pub fn spawn(db: RegistryDb, hash_tx: watch::Sender<String>) -> Self {
        let (tx, mut rx) = mpsc::channel::<RegistryCommand>(256);

        let recompute_hash = |db: &RegistryDb, hash_tx: &watch::Sender<String>| {
            if let Ok(records) = db.get_all_services() {
                let _ = hash_tx.send(hash::compute_hash(&records));
            }
        };

        thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    RegistryCommand::Replace { service, environment, endpoints, reply } => {
                        let result = db.replace_endpoints(&service, &environment, &endpoints);
                        if matches!(&result, Ok(true)) {
                            tracing::debug!(
                                "Registry now has {} endpoint(s) for {}/{}",
                                endpoints.len(),
                                service,
                                environment
                            );
                            recompute_hash(&db, &hash_tx);
                        }
                        let _ = reply.send(result);
                    }
                    RegistryCommand::GetAll(reply) => {
                        let _ = reply.send(db.get_all_services());
                    }
                    RegistryCommand::GetByEnvironment(environment, reply) => {
                        let _ = reply.send(db.get_services_by_environment(&environment));
                    }
                    RegistryCommand::GetOne { service, environment, reply } => {
                        let _ = reply.send(db.get_service(&service, &environment));
                    }
                    RegistryCommand::Shutdown => {
                        tracing::info!("Registry thread shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Replace the endpoints of a service. Returns true if data changed.
    pub async fn replace(
        &self,
        service: String,
        environment: String,
        endpoints: EndpointSet,
    ) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Replace { service, environment, endpoints, reply })
            .await?;
        rx.await?
    }

    pub async fn get_all(&self) -> Result<Vec<ServiceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RegistryCommand::GetAll(reply)).await?;
        rx.await?
    }

    pub async fn get_by_environment(&self, environment: String) -> Result<Vec<ServiceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RegistryCommand::GetByEnvironment(environment, reply)).await?;
        rx.await?
    }

    pub async fn get_one(&self, service: String, environment: String) -> Result<Option<ServiceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::GetOne { service, environment, reply })
            .await?;
        rx.await?
    }

    /// Shutdown the registry thread
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(RegistryCommand::Shutdown).await?;
        Ok(())
    }
}

impl RegistryClient for RegistryHandle {
    async fn publish(
        &self,
        service: &str,
        environment: &str,
        endpoints: &EndpointSet,
    ) -> Result<(), PublishError> {
        self.replace(service.to_string(), environment.to_string(), endpoints.clone())
            .await
            .map(|_changed| ())
            .map_err(|e| {
                if e.is::<mpsc::error::SendError<RegistryCommand>>()
                    || e.is::<oneshot::error::RecvError>()
                {
                    PublishError::Closed
                } else {
                    PublishError::Rejected(format!("{:#}", e))
                }
            })
    }
}
