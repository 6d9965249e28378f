use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::KeyValueStore;

/// Upstash Redis over its REST API: each command is a JSON array POSTed to
/// the database URL, and the reply comes back as `{"result": ..}` or
/// `{"error": ..}`.
pub struct UpstashStore {
    url: String,
    token: SecretString,
    client: reqwest::Client,
}

impl UpstashStore {
    pub fn new(url: String, token: SecretString) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    async fn command(&self, args: Vec<String>) -> anyhow::Result<Value> {
        let name = args.first().cloned().unwrap_or_default();

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(self.token.expose_secret())
            .json(&args)
            .send()
            .await
            .with_context(|| format!("failed to call Upstash {name}"))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .context("failed to parse Upstash response")?;

        if let Some(err) = data.get("error").and_then(Value::as_str) {
            anyhow::bail!("Upstash {name} failed ({status}): {err}");
        }
        if !status.is_success() {
            anyhow::bail!("Upstash API error ({status}): {data}");
        }

        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl KeyValueStore for UpstashStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let result = self
            .command(vec!["GET".to_string(), key.to_string()])
            .await?;
        Ok(result.as_str().map(str::to_string))
    }

    async fn hgetall(&self, key: &str) -> anyhow::Result<HashMap<String, String>> {
        let result = self
            .command(vec!["HGETALL".to_string(), key.to_string()])
            .await?;
        pairs_to_map(&result)
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> anyhow::Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut args = Vec::with_capacity(2 + fields.len() * 2);
        args.push("HSET".to_string());
        args.push(key.to_string());
        for (field, value) in fields {
            args.push(field.clone());
            args.push(value.clone());
        }
        self.command(args).await?;
        Ok(())
    }
}

/// HGETALL replies with a flat `[field, value, field, value, ..]` array.
fn pairs_to_map(result: &Value) -> anyhow::Result<HashMap<String, String>> {
    let items = match result {
        Value::Null => return Ok(HashMap::new()),
        Value::Array(items) => items,
        other => anyhow::bail!("unexpected HGETALL reply: {other}"),
    };
    if items.len() % 2 != 0 {
        anyhow::bail!("HGETALL reply has an odd number of items");
    }

    items
        .chunks(2)
        .map(|pair| -> anyhow::Result<(String, String)> {
            let field = pair[0]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("non-string field in HGETALL reply"))?;
            let value = pair[1]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("non-string value in HGETALL reply"))?;
            Ok((field.to_string(), value.to_string()))
        })
        .collect()
}
