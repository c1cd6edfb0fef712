use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use crate::protocol::ENDPOINT_VERSION;

/// One discovered network endpoint for a service.
///
/// Equality covers every field: service, address, version and properties.
/// Carries no per-construction identifier; whoever stores endpoints assigns
/// its own identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Service name, taken from the descriptor file stem
    service: String,

    /// `host:port`
    address: String,

    /// Always [`ENDPOINT_VERSION`] for endpoints built from descriptor files
    version: String,

    /// Every descriptor key other than host and port, verbatim
    properties: BTreeMap<String, Value>,
}

impl Endpoint {
    pub fn new(
        service: impl Into<String>,
        host: &str,
        port: u16,
        properties: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            service: service.into(),
            address: format!("{}:{}", host, port),
            version: ENDPOINT_VERSION.to_string(),
            properties,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Total ordering key. `Value` has no `Ord`, so properties are compared
    /// through their serialized form, which is stable because both the outer
    /// map and nested JSON objects are key-sorted.
    fn sort_key(&self) -> (String, String, String, String) {
        (
            self.service.clone(),
            self.address.clone(),
            self.version.clone(),
            serde_json::to_string(&self.properties).unwrap_or_default(),
        )
    }
}

/// An unordered set of endpoints.
///
/// Stored sorted and deduplicated so that `==` is set equality regardless of
/// the order endpoints were listed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EndpointSet(Vec<Endpoint>);

impl EndpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.0.iter()
    }

    pub fn addresses(&self) -> Vec<&str> {
        self.0.iter().map(Endpoint::address).collect()
    }
}

impl From<Vec<Endpoint>> for EndpointSet {
    fn from(mut endpoints: Vec<Endpoint>) -> Self {
        endpoints.sort_by_cached_key(Endpoint::sort_key);
        endpoints.dedup();
        Self(endpoints)
    }
}

impl FromIterator<Endpoint> for EndpointSet {
    fn from_iter<I: IntoIterator<Item = Endpoint>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'de> Deserialize<'de> for EndpointSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Endpoint>::deserialize(deserializer).map(Self::from)
    }
}

/// The registry's authoritative view of one service in one environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub service: String,

    /// Deployment environment, e.g. "staging"
    pub environment: String,

    pub endpoints: EndpointSet,

    /// Last time a publish changed this record
    pub updated_at: DateTime<Utc>,
}
