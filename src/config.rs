use std::collections::HashMap;
use std::env;

use secrecy::SecretString;
use serde_json::Value;

use crate::db::KeyValueStore;
use crate::models::AgentVariant;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("missing required config key: {0}")]
    MissingKey(String),

    #[error("no config found in store for key '{0}'")]
    ProfileNotFound(String),

    #[error("invalid JSON in store for key '{key}': {source}")]
    InvalidJson {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("config store error: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KvBackend {
    Upstash,
    Memory,
}

/// Process-level settings read once at startup. Everything vendor-specific
/// lives in the remote profile and goes through [`ConfigResolver`].
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub profile: String,
    pub env_tag: String,
    pub agent_variant: AgentVariant,
    pub kv_backend: KvBackend,
    pub config_store_url: String,
    pub config_store_token: String,
    pub max_jobs: usize,
    pub availability_delay_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = env::var("PROFILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEnv("PROFILE"))?;

        let kv_backend = match env::var("KV_BACKEND")
            .unwrap_or_else(|_| "upstash".to_string())
            .to_lowercase()
            .as_str()
        {
            "upstash" => KvBackend::Upstash,
            "memory" => KvBackend::Memory,
            other => {
                return Err(ConfigError::InvalidEnv {
                    name: "KV_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let variant = env::var("AGENT_VARIANT").unwrap_or_else(|_| "phone".to_string());
        let agent_variant = variant.parse::<AgentVariant>().map_err(|_| ConfigError::InvalidEnv {
            name: "AGENT_VARIANT",
            value: variant.clone(),
        })?;

        let (config_store_url, config_store_token) = match kv_backend {
            KvBackend::Upstash => (
                env::var("UPSTASH_CONFIG_REDIS_URL")
                    .map_err(|_| ConfigError::MissingEnv("UPSTASH_CONFIG_REDIS_URL"))?,
                env::var("UPSTASH_CONFIG_REDIS_TOKEN")
                    .map_err(|_| ConfigError::MissingEnv("UPSTASH_CONFIG_REDIS_TOKEN"))?,
            ),
            KvBackend::Memory => (String::new(), String::new()),
        };

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            profile,
            env_tag: env::var("ENV")
                .unwrap_or_else(|_| "dev".to_string())
                .to_lowercase(),
            agent_variant,
            kv_backend,
            config_store_url,
            config_store_token,
            // A non-numeric or zero cap falls back to one job.
            max_jobs: env::var("MAX_JOBS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|m| *m > 0)
                .unwrap_or(1),
            availability_delay_ms: env::var("AVAILABILITY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        })
    }
}

pub fn profile_key(profile: &str) -> String {
    format!("config:env:{profile}")
}

/// Flattens `{"group": [{"key": .., "value": ..}, ..], ..}` into one map.
/// Entries without a key or with a null value are skipped.
pub fn flatten_config(config: &Value) -> HashMap<String, String> {
    let mut flat = HashMap::new();
    let Some(groups) = config.as_object() else {
        return flat;
    };

    for items in groups.values() {
        let Some(items) = items.as_array() else {
            continue;
        };
        for item in items {
            let key = item.get("key").and_then(Value::as_str);
            let value = item.get("value").filter(|v| !v.is_null());
            if let (Some(key), Some(value)) = (key, value) {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                flat.insert(key.to_string(), value);
            }
        }
    }
    flat
}

/// Flat key-value configuration for one deployment profile.
///
/// Fetched once and shared by every component that needs a key, instead of
/// each lookup going back to the store.
#[derive(Clone, Debug, Default)]
pub struct ConfigResolver {
    profile: String,
    values: HashMap<String, String>,
}

impl ConfigResolver {
    pub async fn load(store: &dyn KeyValueStore, profile: &str) -> Result<Self, ConfigError> {
        let key = profile_key(profile);
        let raw = store
            .get(&key)
            .await?
            .ok_or_else(|| ConfigError::ProfileNotFound(key.clone()))?;

        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::InvalidJson { key: key.clone(), source })?;

        let values = flatten_config(&parsed);
        tracing::info!(profile, keys = values.len(), "loaded profile config");
        Ok(Self::from_map(profile, values))
    }

    /// Local runs without a config store read keys straight from the process
    /// environment.
    pub fn from_process_env(profile: &str) -> Self {
        Self::from_map(profile, env::vars().collect())
    }

    pub fn from_map(profile: &str, mut values: HashMap<String, String>) -> Self {
        values.insert("PROFILE".to_string(), profile.to_string());
        Self {
            profile: profile.to_string(),
            values,
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn get(
        &self,
        key: &str,
        default: Option<&str>,
        required: bool,
    ) -> Result<Option<String>, ConfigError> {
        let value = self
            .values
            .get(key)
            .cloned()
            .or_else(|| default.map(str::to_string));

        if required && value.is_none() {
            return Err(ConfigError::MissingKey(key.to_string()));
        }
        Ok(value)
    }

    pub fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key, None, true)?
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn optional(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// A credential is usable only if present and non-blank.
    pub fn credential(&self, key: &str) -> Option<SecretString> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != "null")
            .map(|v| SecretString::from(v.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use secrecy::ExposeSecret;
    use serde_json::json;

    #[test]
    fn test_flatten_groups() {
        let payload = json!({
            "speech": [
                {"key": "DEEPGRAM_API_KEY", "value": "dg"},
                {"key": "AWS_REGION", "value": "ap-south-1"}
            ],
            "limits": [{"key": "MAX_TOKENS", "value": 150}],
            "broken": [{"key": "NO_VALUE", "value": null}, {"value": "orphan"}],
            "ignored": "not a list"
        });

        let flat = flatten_config(&payload);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat["DEEPGRAM_API_KEY"], "dg");
        assert_eq!(flat["MAX_TOKENS"], "150");
        assert!(!flat.contains_key("NO_VALUE"));
    }

    #[test]
    fn test_get_required_and_default() {
        let resolver = ConfigResolver::from_map(
            "dev",
            HashMap::from([("A".to_string(), "1".to_string())]),
        );

        assert_eq!(resolver.get("A", None, true).unwrap(), Some("1".to_string()));
        assert_eq!(
            resolver.get("B", Some("fallback"), true).unwrap(),
            Some("fallback".to_string())
        );
        assert_eq!(resolver.get("B", None, false).unwrap(), None);
        assert!(matches!(
            resolver.get("B", None, true),
            Err(ConfigError::MissingKey(k)) if k == "B"
        ));
        assert_eq!(resolver.require("PROFILE").unwrap(), "dev");
    }

    #[test]
    fn test_credential_ignores_blank_values() {
        let resolver = ConfigResolver::from_map(
            "dev",
            HashMap::from([
                ("EMPTY".to_string(), "  ".to_string()),
                ("NULLISH".to_string(), "null".to_string()),
                ("KEY".to_string(), "secret".to_string()),
            ]),
        );

        assert!(resolver.credential("EMPTY").is_none());
        assert!(resolver.credential("NULLISH").is_none());
        assert!(resolver.credential("MISSING").is_none());
        assert_eq!(resolver.credential("KEY").unwrap().expose_secret(), "secret");
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = MemoryStore::new();
        store
            .set(
                "config:env:dev",
                r#"{"vendors":[{"key":"OPEN_AI_API_KEY","value":"sk-test"}]}"#,
            )
            .await;

        let resolver = ConfigResolver::load(&store, "dev").await.unwrap();
        assert_eq!(resolver.profile(), "dev");
        assert_eq!(resolver.optional("OPEN_AI_API_KEY").as_deref(), Some("sk-test"));
        assert_eq!(resolver.optional("PROFILE").as_deref(), Some("dev"));
    }

    #[tokio::test]
    async fn test_load_missing_profile() {
        let store = MemoryStore::new();
        let err = ConfigResolver::load(&store, "prod").await.unwrap_err();
        assert!(matches!(err, ConfigError::ProfileNotFound(k) if k == "config:env:prod"));
    }

    #[tokio::test]
    async fn test_load_invalid_json() {
        let store = MemoryStore::new();
        store.set("config:env:dev", "{not json").await;
        let err = ConfigResolver::load(&store, "dev").await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { .. }));
    }
}
