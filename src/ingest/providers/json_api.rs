// src/ingest/providers/json_api.rs
//! Collector for boards that expose a JSON listing endpoint.
//!
//! The response is either a bare array of programs or an object holding the
//! array somewhere inside; `items_pointer` is an RFC 6901 JSON pointer to it
//! (e.g. `/data/items`). Items are read as [`RawProgram`].

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::ingest::adapter::{ProgramSource, RawProgram};

pub struct JsonApiCollector {
    name: String,
    url: String,
    items_pointer: Option<String>,
    api_key: Option<(String, String)>,
    client: reqwest::Client,
}

impl JsonApiCollector {
    pub fn new(name: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            items_pointer: None,
            api_key: None,
            client,
        }
    }

    pub fn with_items_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.items_pointer = Some(pointer.into());
        self
    }

    /// Sent as a query parameter, which is how the public data portals take keys.
    pub fn with_api_key(mut self, param: impl Into<String>, key: impl Into<String>) -> Self {
        self.api_key = Some((param.into(), key.into()));
        self
    }

    pub(crate) fn extract_programs(&self, body: Value) -> Result<Vec<RawProgram>> {
        extract_programs(body, self.items_pointer.as_deref())
            .with_context(|| format!("{}: unexpected response shape", self.name))
    }
}

fn extract_programs(body: Value, pointer: Option<&str>) -> Result<Vec<RawProgram>> {
    let items = match pointer {
        Some(p) => body
            .pointer(p)
            .cloned()
            .ok_or_else(|| anyhow!("no value at {p}"))?,
        None => body,
    };
    let Value::Array(items) = items else {
        return Err(anyhow!("expected an array of programs"));
    };

    // One malformed item should not sink the whole board.
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<RawProgram>(item) {
            Ok(p) => out.push(p),
            Err(e) => tracing::debug!(target: "ingest", error = %e, "skipping malformed item"),
        }
    }
    Ok(out)
}

#[async_trait]
impl ProgramSource for JsonApiCollector {
    async fn fetch_programs(&self) -> Result<Vec<RawProgram>> {
        let mut req = self.client.get(self.url.as_str());
        if let Some((param, key)) = &self.api_key {
            req = req.query(&[(param.as_str(), key.as_str())]);
        }
        let body: Value = req
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("{} http get()", self.name))?
            .json()
            .await
            .with_context(|| format!("{} decoding json", self.name))?;
        self.extract_programs(body)
    }
}
