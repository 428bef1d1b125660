//! Incoming request: the transport context handed to controllers.

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use serde_json::{Map, Value};

use crate::error::InputError;

/// An incoming HTTP request with its body already read.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    pub fn from_parts(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self { method, uri, headers, body }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw input object for controllers: query pairs, overridden by the
    /// body's keys.
    ///
    /// JSON bodies must be objects. Form bodies and the query string turn
    /// repeated keys into arrays. Other content types contribute nothing.
    pub fn input(&self) -> Result<Map<String, Value>, InputError> {
        let mut input = Map::new();
        if let Some(query) = self.query() {
            merge_pairs(&mut input, serde_urlencoded::from_str(query)?);
        }
        if self.body.is_empty() {
            return Ok(input);
        }

        let content_type = self.header("content-type").unwrap_or_default();
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case("application/json") {
            match serde_json::from_slice::<Value>(&self.body)? {
                Value::Object(body) => input.extend(body),
                _ => return Err(InputError::NotAnObject),
            }
        } else if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            let mut body = Map::new();
            merge_pairs(&mut body, serde_urlencoded::from_bytes(&self.body)?);
            input.extend(body);
        }
        Ok(input)
    }
}

fn merge_pairs(into: &mut Map<String, Value>, pairs: Vec<(String, String)>) {
    for (key, value) in pairs {
        let value = Value::String(value);
        match into.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                into.insert(key, value);
            }
        }
    }
}
