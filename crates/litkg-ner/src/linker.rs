//! Entity linking client.
//!
//! A linker endpoint takes raw text (POST body) and answers with a JSON map
//! of start character to entity:
//!
//! ```json
//! {"12": {"concept_id": "C0006142", "canonical_name": "Malignant neoplasm of breast",
//!         "start_char": 12, "end_char": 25}}
//! ```
//!
//! Several endpoints (one per model) can be configured; their maps are merged
//! in order and later endpoints overwrite earlier ones at the same start.

use std::time::Duration;

use litkg_common::EntityIndex;
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::error::LinkerError;

pub trait EntityLinker: Send + Sync {
    fn link(&self, text: &str) -> Result<EntityIndex, LinkerError>;
}

#[derive(Debug, Clone)]
pub struct HttpEntityLinker {
    endpoints: Vec<String>,
    client: Client,
}

impl HttpEntityLinker {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Result<Self, LinkerError> {
        if endpoints.is_empty() {
            return Err(LinkerError::NoEndpoints);
        }
        let client = Client::builder().timeout(timeout).build().map_err(|e| LinkerError::Request {
            endpoint: endpoints.join(","),
            reason: e.to_string(),
        })?;
        Ok(Self { endpoints, client })
    }

    fn fetch(&self, endpoint: &str, text: &str) -> Result<EntityIndex, LinkerError> {
        let resp = self
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(text.to_string())
            .send()
            .map_err(|e| LinkerError::Request { endpoint: endpoint.to_string(), reason: e.to_string() })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LinkerError::Request {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {status}"),
            });
        }
        let body = resp
            .text()
            .map_err(|e| LinkerError::Response { endpoint: endpoint.to_string(), reason: e.to_string() })?;
        parse_entities(endpoint, &body)
    }
}

impl EntityLinker for HttpEntityLinker {
    /// Merge the entities of every endpoint. An endpoint that fails is logged
    /// and skipped; the call fails only when all of them do.
    fn link(&self, text: &str) -> Result<EntityIndex, LinkerError> {
        let mut merged = EntityIndex::new();
        let mut last_error = None;
        let mut answered = 0;

        for endpoint in &self.endpoints {
            match self.fetch(endpoint, text) {
                Ok(found) => {
                    answered += 1;
                    let total = found.len();
                    let dupes = merged.merge(found);
                    debug!(endpoint = %endpoint, total, dupes, "Entities linked");
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Entity linker failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if answered == 0 => Err(e),
            _ => Ok(merged),
        }
    }
}

fn parse_entities(endpoint: &str, body: &str) -> Result<EntityIndex, LinkerError> {
    serde_json::from_str(body)
        .map_err(|e| LinkerError::Response { endpoint: endpoint.to_string(), reason: e.to_string() })
}
