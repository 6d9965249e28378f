//! Environment-driven selection of the speech and language vendors for a call.
//!
//! Each kind (LLM, STT, TTS) has a static table mapping the deployment's
//! environment tag to a provider name, a set of named construction strategies,
//! and one designated fallback provider. Selection tries the mapped provider,
//! then the fallback once, and fails if neither can be constructed.

pub mod llm;
pub mod stt;
pub mod tts;

use std::fmt;

use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;

use crate::config::ConfigResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Llm,
    Stt,
    Tts,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::Llm => "LLM",
            ProviderKind::Stt => "STT",
            ProviderKind::Tts => "TTS",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no strategy found for {kind}: {name}")]
    UnknownStrategy { kind: ProviderKind, name: String },

    #[error("no valid {0} configuration found")]
    NoValidConfiguration(ProviderKind),
}

/// A provider that has everything it needs to be instantiated by the host
/// runtime. Credentials stay out of serialized output.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHandle {
    pub kind: ProviderKind,
    pub name: &'static str,
    pub options: Value,
    #[serde(skip)]
    credentials: Vec<(&'static str, SecretString)>,
}

impl ProviderHandle {
    pub fn new(kind: ProviderKind, name: &'static str, options: Value) -> Self {
        Self {
            kind,
            name,
            options,
            credentials: vec![],
        }
    }

    pub fn with_credential(mut self, key: &'static str, secret: SecretString) -> Self {
        self.credentials.push((key, secret));
        self
    }

    pub fn credential(&self, key: &str) -> Option<&SecretString> {
        self.credentials
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

/// Builds a handle from the resolved config, or `None` when a credential is
/// missing. Missing credentials are not errors at this level.
pub type StrategyFn = fn(&ConfigResolver) -> Option<ProviderHandle>;

pub struct ProviderFactory {
    pub kind: ProviderKind,
    pub env_map: &'static [(&'static str, &'static str)],
    /// Used when the environment tag is not in `env_map`.
    pub default_provider: &'static str,
    pub fallback_provider: &'static str,
    pub strategies: &'static [(&'static str, StrategyFn)],
}

impl ProviderFactory {
    pub fn provider_for_env(&self, env_tag: &str) -> &'static str {
        let env_tag = env_tag.trim().to_lowercase();
        self.env_map
            .iter()
            .find(|(env, _)| *env == env_tag)
            .map(|(_, name)| *name)
            .unwrap_or(self.default_provider)
    }

    fn strategy(&self, name: &str) -> Option<StrategyFn> {
        self.strategies
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    pub fn select(
        &self,
        env_tag: &str,
        config: &ConfigResolver,
    ) -> Result<ProviderHandle, ProviderError> {
        let kind = self.kind;
        let selected = self.provider_for_env(env_tag);
        tracing::debug!(%kind, env = env_tag, provider = selected, "selected provider");

        let strategy = self.strategy(selected).ok_or_else(|| {
            tracing::error!(%kind, provider = selected, "no strategy found");
            ProviderError::UnknownStrategy {
                kind,
                name: selected.to_string(),
            }
        })?;

        tracing::info!(%kind, provider = selected, "attempting to instantiate provider");
        if let Some(handle) = strategy(config) {
            tracing::info!(%kind, provider = selected, "instantiated provider");
            return Ok(handle);
        }

        if selected != self.fallback_provider {
            tracing::warn!(
                %kind,
                provider = selected,
                fallback = self.fallback_provider,
                "selected provider failed, falling back"
            );
            let fallback = self.strategy(self.fallback_provider).ok_or_else(|| {
                ProviderError::UnknownStrategy {
                    kind,
                    name: self.fallback_provider.to_string(),
                }
            })?;
            if let Some(handle) = fallback(config) {
                tracing::info!(%kind, provider = self.fallback_provider, "instantiated fallback provider");
                return Ok(handle);
            }
        }

        tracing::error!(%kind, "no valid provider configuration found");
        Err(ProviderError::NoValidConfiguration(kind))
    }
}

/// The three handles a call session runs with.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSet {
    pub llm: ProviderHandle,
    pub stt: ProviderHandle,
    pub tts: ProviderHandle,
}

impl ProviderSet {
    pub fn select(env_tag: &str, config: &ConfigResolver) -> Result<Self, ProviderError> {
        Ok(Self {
            llm: llm::FACTORY.select(env_tag, config)?,
            stt: stt::FACTORY.select(env_tag, config)?,
            tts: tts::FACTORY.select(env_tag, config)?,
        })
    }
}

/// Shared strategy body: every key in `required` must resolve to a usable
/// credential; `optional` keys are attached when present.
pub(crate) fn keyed(
    config: &ConfigResolver,
    kind: ProviderKind,
    name: &'static str,
    required: &[&'static str],
    optional: &[&'static str],
    options: Value,
) -> Option<ProviderHandle> {
    let mut handle = ProviderHandle::new(kind, name, options);

    for &key in required {
        match config.credential(key) {
            Some(secret) => handle = handle.with_credential(key, secret),
            None => {
                tracing::warn!(%kind, provider = name, key, "missing credential");
                return None;
            }
        }
    }
    for &key in optional {
        if let Some(secret) = config.credential(key) {
            handle = handle.with_credential(key, secret);
        }
    }

    tracing::debug!(%kind, provider = name, "credentials resolved");
    Some(handle)
}

/// Service-account JSON must decode to a non-empty object.
pub(crate) fn google_service_account(
    config: &ConfigResolver,
    kind: ProviderKind,
    options: Value,
) -> Option<ProviderHandle> {
    use secrecy::ExposeSecret;

    let raw = config.credential("GOOGLE_SA_JSON");
    let valid = raw.as_ref().is_some_and(|secret| {
        serde_json::from_str::<Value>(secret.expose_secret())
            .ok()
            .and_then(|v| v.as_object().map(|o| !o.is_empty()))
            .unwrap_or(false)
    });

    match raw {
        Some(secret) if valid => {
            Some(ProviderHandle::new(kind, "google", options).with_credential("GOOGLE_SA_JSON", secret))
        }
        _ => {
            tracing::warn!(%kind, provider = "google", "missing or invalid Google credentials");
            None
        }
    }
}
