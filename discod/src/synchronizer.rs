use std::collections::BTreeMap;
use shared::protocol::RECOGNIZED_EXTENSION;
use shared::types::{EndpointSet, ServiceRecord};
use crate::registry::RegistryClient;
use crate::source::parser;
use crate::source::scanner::{self, DirectorySource, FileState, ScannedFile};
use crate::store::SnapshotStore;

/// Outcome counts for one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub published: usize,
    pub unchanged: usize,
    pub parse_failures: usize,
    pub publish_failures: usize,
    /// The directory could not be listed; nothing was looked at
    pub skipped: bool,
}

/// Keeps the registry in step with a directory of `<service>.json` files.
///
/// Every publish carries the full endpoint set of one service under this
/// synchronizer's environment. A snapshot only moves forward once the
/// registry has acknowledged the matching publish, so a failed publish is
/// simply attempted again on the next tick.
pub struct Synchronizer<D, R> {
    directory: D,
    registry: R,
    environment: String,
    store: SnapshotStore,
}

impl<D, R> Synchronizer<D, R>
where
    D: DirectorySource,
    R: RegistryClient,
{
    pub fn new(directory: D, registry: R, environment: impl Into<String>) -> Self {
        Self {
            directory,
            registry,
            environment: environment.into(),
            store: SnapshotStore::new(),
        }
    }

    /// Start from what the registry already holds for this environment, so
    /// files deleted while nothing was running are still retracted.
    pub fn seed(&mut self, records: impl IntoIterator<Item = ServiceRecord>) {
        for record in records {
            if record.environment == self.environment {
                self.store.seed(&record.service, record.endpoints);
            }
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run one scan → parse → diff → publish cycle to completion.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        let files = match scanner::scan(&self.directory) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Failed to list service directory, keeping current state: {}", e);
                report.skipped = true;
                return report;
            }
        };

        // Everything tracked starts out absent so vanished files are noticed
        let mut states: BTreeMap<String, ScannedFile> = self
            .store
            .services()
            .map(|service| {
                let file = ScannedFile {
                    service: service.to_string(),
                    file_name: format!("{}.{}", service, RECOGNIZED_EXTENSION),
                    state: FileState::Absent,
                };
                (file.service.clone(), file)
            })
            .collect();
        for file in files {
            states.insert(file.service.clone(), file);
        }

        for file in states.into_values() {
            match &file.state {
                FileState::Present(contents) => {
                    self.sync_contents(&file, contents, &mut report).await
                }
                FileState::Absent => self.sync_absence(&file.service, &mut report).await,
            }
        }

        report
    }

    async fn sync_contents(&mut self, file: &ScannedFile, contents: &[u8], report: &mut TickReport) {
        let service = file.service.as_str();
        let endpoints: EndpointSet = match parser::parse(service, contents) {
            Ok(endpoints) => endpoints.into(),
            Err(e) => {
                tracing::warn!("Ignoring unparseable {}: {}", file.file_name, e);
                self.store.mark_present(service);
                report.parse_failures += 1;
                return;
            }
        };

        let previous = self.store.get(service);
        if previous.is_some_and(|snapshot| !snapshot.present) {
            tracing::debug!("{} reappeared", file.file_name);
        }

        let unchanged = previous.is_some_and(|snapshot| snapshot.endpoints == endpoints);
        if unchanged {
            self.store.mark_present(service);
            report.unchanged += 1;
            return;
        }

        match self.registry.publish(service, &self.environment, &endpoints).await {
            Ok(()) => {
                tracing::info!(
                    "Published {} endpoint(s) for {}/{}",
                    endpoints.len(),
                    service,
                    self.environment
                );
                self.store.apply(service, endpoints);
                report.published += 1;
            }
            Err(e) => {
                tracing::error!("Failed to publish {}/{}: {}", service, self.environment, e);
                self.store.mark_present(service);
                report.publish_failures += 1;
            }
        }
    }

    async fn sync_absence(&mut self, service: &str, report: &mut TickReport) {
        let Some(snapshot) = self.store.get(service) else {
            // Never successfully parsed, nothing to retract
            return;
        };

        if snapshot.endpoints.is_empty() {
            self.store.mark_absent(service, true);
            report.unchanged += 1;
            return;
        }

        match self
            .registry
            .publish(service, &self.environment, &EndpointSet::new())
            .await
        {
            Ok(()) => {
                tracing::info!("Removed all endpoints for {}/{}", service, self.environment);
                self.store.mark_absent(service, true);
                report.published += 1;
            }
            Err(e) => {
                tracing::error!(
                    "Failed to remove endpoints for {}/{}: {}",
                    service,
                    self.environment,
                    e
                );
                self.store.mark_absent(service, false);
                report.publish_failures += 1;
            }
        }
    }
}
