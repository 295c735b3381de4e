use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid classifier URL {0}: {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Model id sent to the classifier -> name shown to users.
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_batch_files")]
    pub max_batch_files: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_port() -> u16 {
    8081
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_model() -> String {
    "votingensemble".to_string()
}

fn default_models() -> BTreeMap<String, String> {
    [
        ("xgboost", "XGBoost"),
        ("catboost", "CatBoost"),
        ("lightgbm", "LightGBM"),
        ("votingensemble", "Voting Ensemble"),
    ]
    .into_iter()
    .map(|(id, name)| (id.to_string(), name.to_string()))
    .collect()
}

fn default_max_batch_files() -> usize {
    20
}

fn default_max_file_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_cache_capacity() -> usize {
    128
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            default_model: default_model(),
            models: default_models(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_batch_files: default_max_batch_files(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

impl AppConfig {
    /// Reads `BACKEND_CONFIG`, or `config/backend.yaml` next to the workspace,
    /// then applies `PORT` / `CLASSIFIER_URL` from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("BACKEND_CONFIG").unwrap_or_else(|_| {
            let manifest_dir =
                std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
            format!("{}/../config/backend.yaml", manifest_dir)
        });

        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => {
                log::info!("Loading config from {}", config_path);
                Self::from_yaml(&config_str)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Config file {} not found, using defaults", config_path);
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: config_path,
                    source,
                });
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string(), port))?;
        }
        if let Some(base_url) = lookup("CLASSIFIER_URL") {
            self.classifier.base_url = base_url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.classifier.base_url)
            .map_err(|e| ConfigError::InvalidUrl(self.classifier.base_url.clone(), e))?;
        if self.limits.max_batch_files < 2 {
            return Err(ConfigError::InvalidValue(
                "limits.max_batch_files".to_string(),
                self.limits.max_batch_files.to_string(),
            ));
        }
        Ok(())
    }

    /// Display name for a model id; unknown ids are shown as is.
    pub fn display_name(&self, model_id: &str) -> String {
        self.classifier
            .models
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| model_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = AppConfig::from_yaml(
            "classifier:\n  base_url: http://classifier:9000\n  timeout_secs: 30\n",
        )
        .unwrap();
        assert_eq!(config.classifier.base_url, "http://classifier:9000");
        assert_eq!(config.classifier.timeout_secs, 30);
        assert_eq!(config.classifier.default_model, "votingensemble");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.display_name("lightgbm"), "LightGBM");
        assert_eq!(config.display_name("randomforest"), "randomforest");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| match key {
                "PORT" => Some("9090".to_string()),
                "CLASSIFIER_URL" => Some("http://10.0.0.5:8000".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.classifier.base_url, "http://10.0.0.5:8000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|key| (key == "PORT").then(|| "eighty".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue(..))));
    }

    #[test]
    fn test_bad_url_is_rejected() {
        let mut config = AppConfig::default();
        config.classifier.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(..))));
    }
}
