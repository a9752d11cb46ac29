//! Fixture entries: one captured request/response pair.

use crate::fingerprint::{canonical_url, Fingerprint, HeaderMatchList};
use crate::message::{BodyChunk, Request, Response};
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request side of a fixture. Only headers that take part in matching are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRequest {
    pub method: String,
    /// Canonical URL
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<BodyChunk>,
}

/// Recorded request/response pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureEntry {
    pub request: RecordedRequest,
    pub response: Response,
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

impl FixtureEntry {
    /// Snapshot a request/response pair.
    pub fn capture(request: &Request, response: &Response, matchers: &HeaderMatchList) -> Self {
        Self {
            request: RecordedRequest {
                method: request.method.as_str().to_uppercase(),
                url: canonical_url(&request.uri),
                headers: matchers.select(&request.headers),
                body: request.body.iter().cloned().map(BodyChunk::new).collect(),
            },
            response: response.clone(),
            recorded_at: Utc::now(),
        }
    }

    /// Recompute the matching key with the current header selection.
    pub fn fingerprint(&self, matchers: &HeaderMatchList) -> Fingerprint {
        let mut body = BytesMut::new();
        for chunk in &self.request.body {
            body.extend_from_slice(&chunk.data);
        }
        Fingerprint::new(
            &self.request.method,
            &self.request.url,
            &matchers.retain(&self.request.headers),
            &body,
        )
    }
}
