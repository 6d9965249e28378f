use serde_json::json;

use super::{google_service_account, keyed, ProviderFactory, ProviderHandle, ProviderKind};
use crate::config::ConfigResolver;

pub const FACTORY: ProviderFactory = ProviderFactory {
    kind: ProviderKind::Tts,
    env_map: &[
        ("prod", "azure"),
        ("test", "azure"),
        ("dev", "azure"),
        ("client", "azure"),
        ("local", "azure"),
    ],
    default_provider: "aws",
    fallback_provider: "aws",
    strategies: &[
        ("aws", aws),
        ("google", google),
        ("deepgram", deepgram),
        ("cartesia", cartesia),
        ("azure", azure),
    ],
};

fn aws(config: &ConfigResolver) -> Option<ProviderHandle> {
    keyed(
        config,
        ProviderKind::Tts,
        "aws",
        &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_REGION"],
        &["AWS_VOICE_ID"],
        json!({
            "speech_engine": "standard",
            "language": "en-IN",
            "voice": config.optional("AWS_VOICE_ID"),
        }),
    )
}

fn google(config: &ConfigResolver) -> Option<ProviderHandle> {
    google_service_account(config, ProviderKind::Tts, json!({ "language": "en-US" }))
}

fn deepgram(config: &ConfigResolver) -> Option<ProviderHandle> {
    keyed(
        config,
        ProviderKind::Tts,
        "deepgram",
        &["DEEPGRAM_API_KEY"],
        &[],
        json!({ "model": "aura-asteria-en" }),
    )
}

fn cartesia(config: &ConfigResolver) -> Option<ProviderHandle> {
    keyed(
        config,
        ProviderKind::Tts,
        "cartesia",
        &["CARTESIA_API_KEY"],
        &["CARTESIA_VOICE_ID"],
        json!({ "voice": config.optional("CARTESIA_VOICE_ID") }),
    )
}

fn azure(config: &ConfigResolver) -> Option<ProviderHandle> {
    keyed(
        config,
        ProviderKind::Tts,
        "azure",
        &["AZURE_SPEECH_API_KEY", "AZURE_SPEECH_REGION"],
        &[],
        json!({
            "speech_region": config.optional("AZURE_SPEECH_REGION"),
            "voice": "en-US-BrandonMultilingualNeural",
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_azure_region_alone_is_not_enough() {
        let config = ConfigResolver::from_map(
            "prod",
            HashMap::from([
                ("AZURE_SPEECH_REGION".to_string(), "centralindia".to_string()),
                ("AWS_ACCESS_KEY_ID".to_string(), "id".to_string()),
                ("AWS_SECRET_ACCESS_KEY".to_string(), "secret".to_string()),
                ("AWS_REGION".to_string(), "ap-south-1".to_string()),
                ("AWS_VOICE_ID".to_string(), "Aditi".to_string()),
            ]),
        );
        let handle = FACTORY.select("prod", &config).unwrap();
        assert_eq!(handle.name, "aws");
        assert_eq!(handle.options["voice"], "Aditi");
    }

    #[test]
    fn test_azure_selected_when_configured() {
        let config = ConfigResolver::from_map(
            "prod",
            HashMap::from([
                ("AZURE_SPEECH_API_KEY".to_string(), "key".to_string()),
                ("AZURE_SPEECH_REGION".to_string(), "centralindia".to_string()),
            ]),
        );
        let handle = FACTORY.select("prod", &config).unwrap();
        assert_eq!(handle.name, "azure");
        assert_eq!(handle.options["speech_region"], "centralindia");
    }
}
