use std::collections::BTreeMap;
use shared::types::EndpointSet;

/// Last successfully applied state of one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub service: String,
    pub endpoints: EndpointSet,
    /// Whether the backing file was seen on the last scan
    pub present: bool,
}

/// Per-service snapshots, keyed by service name.
///
/// Entries are never removed: once a service name has been seen it is
/// remembered for the lifetime of the store, so a vanished file can be
/// recognized as a deletion.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: BTreeMap<String, Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, service: &str) -> Option<&Snapshot> {
        self.snapshots.get(service)
    }

    /// Service names ever tracked, sorted
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.snapshots.values().map(|snapshot| snapshot.service.as_str())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Record a successfully applied endpoint set for a present file
    pub fn apply(&mut self, service: &str, endpoints: EndpointSet) {
        self.snapshots.insert(
            service.to_string(),
            Snapshot {
                service: service.to_string(),
                endpoints,
                present: true,
            },
        );
    }

    /// Remember endpoints the registry already holds from an earlier run.
    /// The file has not been seen yet, so the snapshot starts out absent;
    /// services already tracked are left alone.
    pub fn seed(&mut self, service: &str, endpoints: EndpointSet) {
        self.snapshots
            .entry(service.to_string())
            .or_insert_with(|| Snapshot {
                service: service.to_string(),
                endpoints,
                present: false,
            });
    }

    /// Record that the backing file is gone. `cleared` is set once the empty
    /// set has reached the registry; until then the old endpoints are kept so
    /// the removal is retried.
    pub fn mark_absent(&mut self, service: &str, cleared: bool) {
        if let Some(snapshot) = self.snapshots.get_mut(service) {
            snapshot.present = false;
            if cleared {
                snapshot.endpoints = EndpointSet::new();
            }
        }
    }

    /// Record that the backing file was seen, without touching endpoints
    pub fn mark_present(&mut self, service: &str) {
        if let Some(snapshot) = self.snapshots.get_mut(service) {
            snapshot.present = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::Endpoint;

    fn set(addrs: &[(&str, u16)]) -> EndpointSet {
        addrs
            .iter()
            .map(|(h, p)| Endpoint::new("svc", h, *p, BTreeMap::new()))
            .collect()
    }

    #[test]
    fn test_apply_and_get() {
        let mut store = SnapshotStore::new();
        assert!(store.get("svc").is_none());

        store.apply("svc", set(&[("a", 1)]));
        let snapshot = store.get("svc").unwrap();
        assert_eq!(snapshot.endpoints, set(&[("a", 1)]));
        assert!(snapshot.present);

        store.apply("svc", set(&[("b", 2)]));
        assert_eq!(store.get("svc").unwrap().endpoints, set(&[("b", 2)]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_mark_absent() {
        let mut store = SnapshotStore::new();
        store.apply("svc", set(&[("a", 1)]));

        store.mark_absent("svc", false);
        let snapshot = store.get("svc").unwrap();
        assert!(!snapshot.present);
        assert_eq!(snapshot.endpoints, set(&[("a", 1)]));

        store.mark_absent("svc", true);
        let snapshot = store.get("svc").unwrap();
        assert!(snapshot.endpoints.is_empty());

        store.mark_present("svc");
        assert!(store.get("svc").unwrap().present);
    }

    #[test]
    fn test_seed() {
        let mut store = SnapshotStore::new();
        store.seed("svc", set(&[("a", 1)]));

        let snapshot = store.get("svc").unwrap();
        assert!(!snapshot.present);
        assert_eq!(snapshot.endpoints, set(&[("a", 1)]));

        // Does not overwrite what this run has already applied
        store.apply("other", set(&[("b", 2)]));
        store.seed("other", EndpointSet::new());
        assert_eq!(store.get("other").unwrap().endpoints, set(&[("b", 2)]));
        assert!(store.get("other").unwrap().present);
    }

    #[test]
    fn test_untracked_marks_are_ignored() {
        let mut store = SnapshotStore::new();
        store.mark_absent("ghost", true);
        store.mark_present("ghost");
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_services_sorted() {
        let mut store = SnapshotStore::new();
        store.apply("b", EndpointSet::new());
        store.apply("a", EndpointSet::new());
        assert_eq!(store.services().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
