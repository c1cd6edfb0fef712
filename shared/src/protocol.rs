/// File extension that marks a file in the watched directory as a service descriptor
pub const RECOGNIZED_EXTENSION: &str = "json";

/// Version stamped on every discovered endpoint. Not derived from file content.
pub const ENDPOINT_VERSION: &str = "1.0";

/// Descriptor keys consumed to build the endpoint address
pub const KEY_HOST: &str = "host";
pub const KEY_PORT: &str = "port";

/// Default directory poll interval
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

/// API path prefix
pub const API_PREFIX: &str = "/v1";
