//! Airtable REST implementation of [`RecordStore`].
//!
//! Every call is one HTTP request, except scans, which follow the `offset` cursor
//! until the last page. Nothing is retried.
//!
//! A 404 on a record URL means the record is gone and maps to
//! [`StoreError::NotFound`]. A 404 on a table URL means the base or table is
//! missing, which is an outage like any other failed request.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::record::{Fields, Record, RecordHandle, RecordStore, ScanQuery};

/// Default Airtable API root.
pub const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";

/// Connection settings for an Airtable base.
#[derive(Debug, Clone)]
pub struct AirtableConfig {
    /// API root, e.g. [`DEFAULT_API_URL`].
    pub api_url: String,
    /// Base identifier (`app...`).
    pub base_id: String,
    /// Personal access token.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl AirtableConfig {
    /// Settings for `base_id` on the public API with a 30 second timeout.
    #[must_use]
    pub fn new(base_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            base_id: base_id.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/{}/{}",
            self.api_url.trim_end_matches('/'),
            self.base_id,
            table
        )
    }
}

#[derive(Serialize)]
struct WriteBody<'a> {
    fields: &'a Fields,
    typecast: bool,
}

#[derive(Deserialize)]
struct ListPage {
    records: Vec<Record>,
    #[serde(default)]
    offset: Option<String>,
}

/// What an HTTP 404 means for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// `/{base}/{table}/{record}`: the record does not exist.
    Record,
    /// `/{base}/{table}`: the table or base does not exist.
    Table,
}

/// HTTP client for one Airtable base.
pub struct AirtableClient {
    config: AirtableConfig,
    client: reqwest::Client,
}

impl AirtableClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the HTTP client cannot be built.
    pub fn new(config: AirtableConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn record_url(&self, table: &str, handle: &RecordHandle) -> String {
        format!("{}/{}", self.config.table_url(table), handle)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        target: Target,
    ) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND && target == Target::Record {
            return Err(StoreError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!("HTTP {status}: {body}")));
        }
        Ok(response)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        target: Target,
    ) -> Result<T> {
        self.send(request, target)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid response: {e}")))
    }
}

fn scan_params(query: &ScanQuery, offset: Option<&str>) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(filter) = &query.filter {
        params.push(("filterByFormula".to_string(), filter.to_formula()));
    }
    for (i, sort) in query.sort.iter().enumerate() {
        params.push((format!("sort[{i}][field]"), sort.field.clone()));
        params.push((
            format!("sort[{i}][direction]"),
            sort.direction.as_str().to_string(),
        ));
    }
    if let Some(max) = query.max_records {
        params.push(("maxRecords".to_string(), max.to_string()));
    }
    if let Some(offset) = offset {
        params.push(("offset".to_string(), offset.to_string()));
    }
    params
}

#[async_trait]
impl RecordStore for AirtableClient {
    async fn create(&self, table: &str, fields: Fields) -> Result<Record> {
        let body = WriteBody {
            fields: &fields,
            typecast: true,
        };
        self.send_json(
            self.client.post(self.config.table_url(table)).json(&body),
            Target::Table,
        )
        .await
    }

    async fn find(&self, table: &str, handle: &RecordHandle) -> Result<Record> {
        self.send_json(self.client.get(self.record_url(table, handle)), Target::Record)
            .await
    }

    async fn update(&self, table: &str, handle: &RecordHandle, fields: Fields) -> Result<Record> {
        let body = WriteBody {
            fields: &fields,
            typecast: true,
        };
        self.send_json(
            self.client.patch(self.record_url(table, handle)).json(&body),
            Target::Record,
        )
        .await
    }

    async fn destroy(&self, table: &str, handle: &RecordHandle) -> Result<()> {
        self.send(self.client.delete(self.record_url(table, handle)), Target::Record)
            .await?;
        Ok(())
    }

    async fn scan(&self, table: &str, query: &ScanQuery) -> Result<Vec<Record>> {
        let url = self.config.table_url(table);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let params = scan_params(query, offset.as_deref());
            let page: ListPage = self
                .send_json(self.client.get(&url).query(&params), Target::Table)
                .await?;
            records.extend(page.records);

            match page.offset {
                Some(next) if !query.max_records.is_some_and(|max| records.len() >= max) => {
                    offset = Some(next);
                }
                _ => break,
            }
        }

        if let Some(max) = query.max_records {
            records.truncate(max);
        }
        tracing::debug!(table, records = records.len(), "Scanned table");
        Ok(records)
    }
}
