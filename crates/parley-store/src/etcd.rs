use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::kv::{Kv, KvError};

/// Remote backend speaking etcd's v3 JSON gateway. Keys and values travel
/// base64-encoded per the gateway contract.
pub struct EtcdKv {
    http: reqwest::Client,
    base_url: String,
}

impl EtcdKv {
    /// `base_url` points at the gateway root, e.g. `http://127.0.0.1:2379`.
    /// `timeout` bounds every request to the store.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, KvError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KvError(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!("etcd gateway at {}", base_url);
        Ok(Self { http, base_url })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, KvError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| KvError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(KvError(format!("{} returned {}", path, resp.status())));
        }
        resp.json().await.map_err(|e| KvError(e.to_string()))
    }
}

/// End of the range covering every key starting with `prefix`: the prefix
/// with its last byte incremented (etcd's `range_end` convention).
fn prefix_end(prefix: &str) -> Vec<u8> {
    let mut end = prefix.as_bytes().to_vec();
    while let Some(last) = end.last_mut() {
        if *last < 0xff {
            *last += 1;
            return end;
        }
        end.pop();
    }
    // Prefix was all 0xff bytes: scan to the end of the keyspace.
    vec![0]
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<RangeKv>,
}

#[derive(Debug, Deserialize)]
struct RangeKv {
    key: String,
    #[serde(default)]
    value: String,
}

#[async_trait]
impl Kv for EtcdKv {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), KvError> {
        let body = json!({
            "key": B64.encode(key),
            "value": B64.encode(value),
        });
        self.call::<serde_json::Value>("/v3/kv/put", body).await?;
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KvError> {
        let body = json!({
            "key": B64.encode(prefix),
            "range_end": B64.encode(prefix_end(prefix)),
        });
        let resp: RangeResponse = self.call("/v3/kv/range", body).await?;
        resp.kvs
            .into_iter()
            .map(|kv| {
                let key = B64
                    .decode(&kv.key)
                    .ok()
                    .and_then(|k| String::from_utf8(k).ok())
                    .ok_or_else(|| KvError(format!("gateway returned non-utf8 key {}", kv.key)))?;
                let value = B64
                    .decode(&kv.value)
                    .map_err(|e| KvError(format!("gateway returned bad value for {}: {}", key, e)))?;
                Ok((key, value))
            })
            .collect()
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let body = json!({ "key": B64.encode(key) });
        self.call::<serde_json::Value>("/v3/kv/deleterange", body)
            .await?;
        Ok(())
    }
}
