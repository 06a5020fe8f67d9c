use crate::error::{PdfWizardError, Result};
use crate::services::planner::DEFAULT_MAX_DEFINITIONS;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub const CONFIG_DIR_NAME: &str = "PDF Wizard";
pub const CONFIG_FILE_NAME: &str = "pdf_wizard_config.json";

/// Interface languages the settings accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
    Ar,
    Fr,
    Ja,
}

impl Language {
    pub const ALL: [Language; 5] = [Self::En, Self::Zh, Self::Ar, Self::Fr, Self::Ja];

    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
            Self::Ar => "ar",
            Self::Fr => "fr",
            Self::Ja => "ja",
        }
    }
}

impl FromStr for Language {
    type Err = PdfWizardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.code() == s.trim().to_lowercase())
            .ok_or_else(|| PdfWizardError::Config {
                reason: format!(
                    "unsupported language '{}' (expected one of en, zh, ar, fr, ja)",
                    s
                ),
            })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unknown codes in a saved file fall back to English instead of failing the load.
impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(code.parse().unwrap_or_else(|_| {
            warn!("Unknown language '{}' in config, using en", code);
            Language::En
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub language: Language,
    pub max_definitions: usize,
    pub default_output_dir: Option<PathBuf>,
    pub operation_timeout_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: Language::En,
            max_definitions: DEFAULT_MAX_DEFINITIONS,
            default_output_dir: None,
            operation_timeout_secs: None,
        }
    }
}

impl AppConfig {
    /// `<config dir>/PDF Wizard/pdf_wizard_config.json`.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| PdfWizardError::Config {
            reason: "could not determine the user config directory".to_string(),
        })?;
        Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Reads the config, falling back to defaults when the file is missing
    /// or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    warn!("Ignoring unreadable config {}: {}", path.display(), e);
                } else {
                    debug!("No config at {}, using defaults", path.display());
                }
                Self::default()
            }
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: AppConfig = serde_json::from_str(&content)?;
        if config.max_definitions == 0 {
            config.max_definitions = DEFAULT_MAX_DEFINITIONS;
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn set_language(&mut self, code: &str) -> Result<()> {
        self.language = code.parse()?;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.language, Language::En);
        assert_eq!(config.max_definitions, 10);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);

        let mut config = AppConfig::default();
        config.set_language("ja").unwrap();
        config.operation_timeout_secs = Some(30);
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path);
        assert_eq!(loaded, config);
        assert_eq!(loaded.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_set_language_rejects_unknown_codes() {
        let mut config = AppConfig::default();
        assert!(config.set_language("de").is_err());
        assert_eq!(config.language, Language::En);
        config.set_language(" FR ").unwrap();
        assert_eq!(config.language, Language::Fr);
    }

    #[test]
    fn test_unknown_language_in_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"language": "de", "maxDefinitions": 4}"#).unwrap();

        let config = AppConfig::load(&path);
        assert_eq!(config.language, Language::En);
        assert_eq!(config.max_definitions, 4);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(AppConfig::load(&path), AppConfig::default());
    }
}
