use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::{EndpointSet, ServiceRecord};

/// `updated_at` is left out: it moves without the published content changing.
#[derive(Serialize)]
struct HashView<'a> {
    service: &'a str,
    environment: &'a str,
    endpoints: &'a EndpointSet,
}

/// SHA-256 over the registry contents, independent of record order.
pub fn compute_hash(records: &[ServiceRecord]) -> String {
    let mut views: Vec<HashView<'_>> = records
        .iter()
        .map(|r| HashView {
            service: &r.service,
            environment: &r.environment,
            endpoints: &r.endpoints,
        })
        .collect();
    views.sort_by(|a, b| (a.environment, a.service).cmp(&(b.environment, b.service)));

    let mut hasher = Sha256::new();
    for view in &views {
        // Only string keys and JSON values: serialization cannot fail
        if let Ok(json) = serde_json::to_vec(view) {
            hasher.update(&json);
            hasher.update(b"\n");
        }
    }
    hex::encode(hasher.finalize())
}
