use serde_json::{Map, Value};
use thiserror::Error;
use shared::protocol::{KEY_HOST, KEY_PORT};
use shared::types::Endpoint;

/// Why a descriptor file could not be turned into endpoints
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a list of endpoints, found {0}")]
    NotAList(&'static str),

    #[error("entry {index}: expected an object, found {found}")]
    NotAnObject { index: usize, found: &'static str },

    #[error("entry {index}: `host` must be a string")]
    InvalidHost { index: usize },

    #[error("entry {index}: `port` must be an integer between 0 and 65535")]
    InvalidPort { index: usize },
}

/// Parse the raw contents of `<service>.json` into endpoints.
///
/// Pure: no I/O, and the same bytes always give the same result.
pub fn parse(service: &str, contents: &[u8]) -> Result<Vec<Endpoint>, ParseError> {
    let value: Value = serde_json::from_slice(contents)?;
    let Value::Array(entries) = value else {
        return Err(ParseError::NotAList(kind(&value)));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(fields) => convert_entry(service, index, fields),
            other => Err(ParseError::NotAnObject {
                index,
                found: kind(&other),
            }),
        })
        .collect()
}

fn convert_entry(
    service: &str,
    index: usize,
    mut fields: Map<String, Value>,
) -> Result<Endpoint, ParseError> {
    let host = match fields.remove(KEY_HOST) {
        Some(Value::String(host)) => host,
        _ => return Err(ParseError::InvalidHost { index }),
    };

    let port = fields
        .remove(KEY_PORT)
        .and_then(|port| port.as_u64())
        .and_then(|port| u16::try_from(port).ok())
        .ok_or(ParseError::InvalidPort { index })?;

    // Whatever is left is carried through untouched
    Ok(Endpoint::new(service, &host, port, fields.into_iter().collect()))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
