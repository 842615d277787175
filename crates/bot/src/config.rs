use core::time::Duration;
use std::{fs, path::Path};

use anyhow::{Context as _, Result, bail};
use forum_core::DEFAULT_HISTORY_LIMIT;
use reply_ai::OpenAiConfig;
use serde::Deserialize;
use tracing::info;

/// Optional YAML overrides. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    #[serde(default)]
    pub(crate) model: Option<String>,
    #[serde(default)]
    pub(crate) temperature: Option<f32>,
    #[serde(default)]
    pub(crate) system_prompt: Option<String>,
    #[serde(default)]
    pub(crate) api_base: Option<String>,
    #[serde(default)]
    pub(crate) request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub(crate) history_limit: Option<u8>,
}

/// Flag/env values that win over the file.
#[derive(Debug, Default)]
pub(crate) struct GenerationOverrides {
    pub(crate) model: Option<String>,
    pub(crate) temperature: Option<f32>,
    pub(crate) api_base: Option<String>,
}

pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        info!(path = %path.display(), "No config file; using defaults");
        return Ok(FileConfig::default());
    }
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    if yaml.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    let cfg: FileConfig = serde_yaml::from_str(&yaml)
        .with_context(|| format!("parsing YAML config at {}", path.display()))?;
    info!(path = %path.display(), "Loaded config file");
    Ok(cfg)
}

pub(crate) fn generation_config(
    file: &FileConfig,
    api_key: String,
    overrides: GenerationOverrides,
) -> Result<OpenAiConfig> {
    let mut config = OpenAiConfig::new(api_key);

    if let Some(model) = overrides.model.or_else(|| file.model.clone()) {
        config.model = model;
    }
    if let Some(base) = overrides.api_base.or_else(|| file.api_base.clone()) {
        config.api_base = base;
    }
    if let Some(temperature) = overrides.temperature.or(file.temperature) {
        if !(0.0..=2.0).contains(&temperature) {
            bail!("temperature must be between 0 and 2, got {temperature}");
        }
        config.temperature = temperature;
    }
    if let Some(prompt) = &file.system_prompt {
        if prompt.trim().is_empty() {
            bail!("system_prompt in config file is empty");
        }
        config.system_prompt.clone_from(prompt);
    }
    if let Some(secs) = file.request_timeout_secs {
        if secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        config.request_timeout = Some(Duration::from_secs(secs));
    }
    Ok(config)
}

pub(crate) fn history_limit(file: &FileConfig) -> Result<u8> {
    let limit = file.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=100).contains(&limit) {
        bail!("history_limit must be between 1 and 100, got {limit}");
    }
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use reply_ai::{DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE};
    use tempfile::NamedTempFile;

    use super::*;

    fn write_yaml(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_file_config(&dir.path().join("config.yaml")).unwrap();
        let generation = generation_config(&cfg, "k".to_owned(), GenerationOverrides::default()).unwrap();

        assert_eq!(generation.model, DEFAULT_MODEL);
        assert!((generation.temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
        assert_eq!(generation.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(generation.request_timeout, None);
        assert_eq!(history_limit(&cfg).unwrap(), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn file_values_are_applied() {
        let file = write_yaml(
            "model: gpt-4o\n\
             temperature: 0.2\n\
             system_prompt: |\n  You are a friendly astronomer.\n\
             request_timeout_secs: 30\n\
             history_limit: 25\n",
        );
        let cfg = load_file_config(file.path()).unwrap();
        let generation = generation_config(&cfg, "k".to_owned(), GenerationOverrides::default()).unwrap();

        assert_eq!(generation.model, "gpt-4o");
        assert!((generation.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(generation.system_prompt, "You are a friendly astronomer.\n");
        assert_eq!(generation.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(history_limit(&cfg).unwrap(), 25);
    }

    #[test]
    fn flags_win_over_file() {
        let file = write_yaml("model: gpt-4o\napi_base: http://file.local\n");
        let cfg = load_file_config(file.path()).unwrap();
        let generation = generation_config(
            &cfg,
            "k".to_owned(),
            GenerationOverrides {
                model: Some("gpt-4.1-mini".to_owned()),
                temperature: Some(1.0),
                api_base: Some("http://flag.local".to_owned()),
            },
        )
        .unwrap();

        assert_eq!(generation.model, "gpt-4.1-mini");
        assert_eq!(generation.api_base, "http://flag.local");
        assert!((generation.temperature - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_file_is_accepted() {
        let file = write_yaml("\n");
        let cfg = load_file_config(file.path()).unwrap();
        assert!(cfg.model.is_none());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cfg = load_file_config(write_yaml("temperature: 3.5\n").path()).unwrap();
        assert!(generation_config(&cfg, "k".to_owned(), GenerationOverrides::default()).is_err());

        let cfg = load_file_config(write_yaml("history_limit: 0\n").path()).unwrap();
        assert!(history_limit(&cfg).is_err());

        let cfg = load_file_config(write_yaml("history_limit: 101\n").path()).unwrap();
        assert!(history_limit(&cfg).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_yaml("modle: gpt-4o\n");
        let err = load_file_config(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("modle"));
    }
}
