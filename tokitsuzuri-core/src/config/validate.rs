//! Configuration validation rules.

use super::schema::{Config, GenerationConfig};

fn validate_generation(name: &str, generation: &GenerationConfig, errors: &mut Vec<String>) {
    if generation.max_tokens == 0 {
        errors.push(format!("{}.max_tokens must be > 0", name));
    }
    if !(0.0..=2.0).contains(&generation.temperature) {
        errors.push(format!("{}.temperature must be in [0.0, 2.0]", name));
    }
}

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    let api_base = config.completion.api_base.trim();
    if api_base.is_empty() {
        errors.push("completion.api_base must not be empty".to_string());
    } else if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
        errors.push("completion.api_base must be an http(s) URL".to_string());
    }
    if config.completion.timeout_secs == 0 {
        errors.push("completion.timeout_secs must be > 0".to_string());
    }

    validate_generation("chat", &config.chat, &mut errors);
    validate_generation("diary", &config.diary, &mut errors);

    if config.storage.dir.trim().is_empty() {
        errors.push("storage.dir must not be empty".to_string());
    }
    if config.storage.quota_bytes == 0 {
        errors.push("storage.quota_bytes must be > 0".to_string());
    }

    if config.speech.lang.trim().is_empty() {
        errors.push("speech.lang must not be empty".to_string());
    }
    if let Some(synth) = &config.speech.synthesizer {
        if !matches!(synth.as_str(), "say" | "espeak-ng" | "espeak") {
            errors.push(format!(
                "speech.synthesizer must be one of say, espeak-ng, espeak (got {})",
                synth
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_config(&Config::default()).unwrap();
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut config = Config::default();
        config.completion.api_base = "ftp://example.com".to_string();
        config.diary.max_tokens = 0;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("completion.api_base"));
        assert!(err.contains("diary.max_tokens"));
    }

    #[test]
    fn test_validate_rejects_unknown_synthesizer() {
        let mut config = Config::default();
        config.speech.synthesizer = Some("festival".to_string());

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("speech.synthesizer"));
    }
}
