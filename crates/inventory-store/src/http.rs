//! HTTP backend speaking the store's `/query`, `/mutate` and `/alter` API.

use crate::client::GraphBackend;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::mutation::{Mutation, MutationResponse};
use crate::query::Query;
use inventory_schema::Uid;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

const ACCESS_TOKEN_HEADER: &str = "X-Dgraph-AccessToken";

pub struct HttpBackend {
    client: Client,
    config: StoreConfig,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: JsonValue,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Default)]
struct MutateData {
    #[serde(default)]
    uids: BTreeMap<String, String>,
}

impl HttpBackend {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.auth_token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| StoreError::Config(format!("bad auth token: {e}")))?;
            headers.insert(ACCESS_TOKEN_HEADER, value);
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn post(&self, path: &str, content_type: &'static str, body: String) -> Result<Envelope, StoreError> {
        let url = self.config.url(path);
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .map_err(|e| StoreError::Transport(format!("failed to reach {url}: {e}")))?;
        decode(resp)
    }
}

fn decode(resp: Response) -> Result<Envelope, StoreError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(StoreError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let envelope: Envelope = resp
        .json()
        .map_err(|e| StoreError::Decode(e.to_string()))?;
    if !envelope.errors.is_empty() {
        let messages: Vec<String> = envelope.errors.iter().map(|e| e.message.clone()).collect();
        return Err(StoreError::Rejected(messages.join("; ")));
    }
    Ok(envelope)
}

impl GraphBackend for HttpBackend {
    fn query(&self, query: &Query) -> Result<JsonValue, StoreError> {
        let dql = query.to_dql()?;
        Ok(self.post("query", "application/dql", dql)?.data)
    }

    fn mutate(&self, mutation: &Mutation) -> Result<MutationResponse, StoreError> {
        if mutation.is_empty() {
            return Ok(MutationResponse::default());
        }
        let envelope = self.post("mutate?commitNow=true", "application/rdf", mutation.to_rdf_request())?;
        let data: MutateData = serde_json::from_value(envelope.data).unwrap_or_default();
        let mut uids = BTreeMap::new();
        for (label, raw) in data.uids {
            let uid = Uid::parse(&raw).map_err(|e| StoreError::Decode(e.to_string()))?;
            uids.insert(label, uid);
        }
        Ok(MutationResponse { uids })
    }

    fn alter(&self, schema: &str) -> Result<(), StoreError> {
        self.post("alter", "application/dql", schema.to_string())?;
        Ok(())
    }
}
