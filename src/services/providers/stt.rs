use serde_json::json;

use super::{google_service_account, keyed, ProviderFactory, ProviderHandle, ProviderKind};
use crate::config::ConfigResolver;

pub const FACTORY: ProviderFactory = ProviderFactory {
    kind: ProviderKind::Stt,
    env_map: &[
        ("prod", "deepgram-3"),
        ("test", "deepgram-3"),
        ("dev", "deepgram-2"),
        ("client", "deepgram-3"),
        ("local", "deepgram-3"),
    ],
    default_provider: "deepgram-3",
    fallback_provider: "deepgram-3",
    strategies: &[
        ("deepgram-3", deepgram_3),
        ("deepgram-2", deepgram_2),
        ("google", google),
        ("openai", openai),
    ],
};

fn deepgram(config: &ConfigResolver, name: &'static str, model: &str) -> Option<ProviderHandle> {
    keyed(
        config,
        ProviderKind::Stt,
        name,
        &["DEEPGRAM_API_KEY"],
        &[],
        json!({
            "model": model,
            "language": "en-IN",
            "smart_format": true,
            "interim_results": false,
        }),
    )
}

fn deepgram_3(config: &ConfigResolver) -> Option<ProviderHandle> {
    deepgram(config, "deepgram-3", "nova-3")
}

fn deepgram_2(config: &ConfigResolver) -> Option<ProviderHandle> {
    deepgram(config, "deepgram-2", "nova-2")
}

fn google(config: &ConfigResolver) -> Option<ProviderHandle> {
    google_service_account(
        config,
        ProviderKind::Stt,
        json!({
            "model": "latest_long",
            "languages": "en-IN",
            "interim_results": false,
            "detect_language": false,
            "punctuate": true,
            "spoken_punctuation": false,
            "min_confidence_threshold": 0.7,
        }),
    )
}

fn openai(config: &ConfigResolver) -> Option<ProviderHandle> {
    keyed(
        config,
        ProviderKind::Stt,
        "openai",
        &["OPEN_AI_API_KEY"],
        &[],
        json!({
            "model": "gpt-4o-transcribe",
            "use_realtime": true,
            "language": "en",
            "detect_language": false,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_dev_prefers_nova_2() {
        let config = ConfigResolver::from_map(
            "dev",
            HashMap::from([("DEEPGRAM_API_KEY".to_string(), "dg".to_string())]),
        );
        let handle = FACTORY.select("dev", &config).unwrap();
        assert_eq!(handle.name, "deepgram-2");
        assert_eq!(handle.options["model"], "nova-2");
    }

    #[test]
    fn test_unknown_env_uses_nova_3() {
        assert_eq!(FACTORY.provider_for_env("staging"), "deepgram-3");
    }

    #[test]
    fn test_no_deepgram_key_fails() {
        let config = ConfigResolver::from_map(
            "dev",
            HashMap::from([("OPEN_AI_API_KEY".to_string(), "sk".to_string())]),
        );
        assert!(FACTORY.select("prod", &config).is_err());
    }
}
