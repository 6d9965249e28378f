use serde_json::json;

use super::{keyed, ProviderFactory, ProviderHandle, ProviderKind};
use crate::config::ConfigResolver;

pub const FACTORY: ProviderFactory = ProviderFactory {
    kind: ProviderKind::Llm,
    env_map: &[
        ("prod", "azure-openai"),
        ("test", "azure-openai"),
        ("dev", "azure-openai"),
        ("client", "openai"),
        ("local", "openai"),
    ],
    default_provider: "openai",
    fallback_provider: "azure-openai",
    strategies: &[
        ("openai", openai),
        ("openai-realtime", openai_realtime),
        ("google", google),
        ("azure-openai", azure_openai),
    ],
};

fn openai(config: &ConfigResolver) -> Option<ProviderHandle> {
    keyed(
        config,
        ProviderKind::Llm,
        "openai",
        &["OPEN_AI_API_KEY"],
        &[],
        json!({
            "model": "gpt-4o-mini",
            "temperature": 0.3,
            "max_completion_tokens": 150,
            "max_retries": 3,
        }),
    )
}

fn openai_realtime(config: &ConfigResolver) -> Option<ProviderHandle> {
    keyed(
        config,
        ProviderKind::Llm,
        "openai-realtime",
        &["OPEN_AI_API_KEY"],
        &[],
        json!({
            "model": "gpt-4o",
            "temperature": 0.1,
            "max_completion_tokens": 150,
            "max_retries": 3,
        }),
    )
}

fn google(config: &ConfigResolver) -> Option<ProviderHandle> {
    keyed(
        config,
        ProviderKind::Llm,
        "google",
        &["GOOGLE_AGENT_API_KEY"],
        &[],
        json!({
            "model": "gemini-2.5-flash",
            "temperature": 0.3,
        }),
    )
}

fn azure_openai(config: &ConfigResolver) -> Option<ProviderHandle> {
    let endpoint = config.optional("AZURE_OPENAI_ENDPOINT").unwrap_or_default();
    keyed(
        config,
        ProviderKind::Llm,
        "azure-openai",
        &["AZURE_OPENAI_API_KEY", "AZURE_OPENAI_ENDPOINT"],
        &[],
        json!({
            "model": "gpt-4o-mini",
            "azure_endpoint": endpoint,
            "azure_deployment": "gpt-4o-mini",
            "api_version": "2024-12-01-preview",
        }),
    )
}
