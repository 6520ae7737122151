use crate::error::AppError;
use std::env;
use std::path::PathBuf;

/// Full application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ToothConfig {
    pub server: ServerConfig,
    pub openai: OpenAiSettings,
    pub uploads: UploadSettings,
    pub classifier: ClassifierSettings,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Multipart body limit in MiB.
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    /// Vision-capable chat model (e.g., gpt-4o).
    pub model: String,
    /// Base URL, overridable so tests can point at a stub.
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Directory where uploaded images are persisted; created at startup.
    pub dir: PathBuf,
}

/// Locations of the two training folders for the manual model.
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    /// Label 0 ("Extraction") samples.
    pub extraction_dir: PathBuf,
    /// Label 1 ("Root Canal Treatment") samples.
    pub rootcanal_dir: PathBuf,
}

impl ToothConfig {
    pub fn load() -> Result<Self, AppError> {
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ToothConfig {
            server: ServerConfig {
                host: get_env("HOST", Some("0.0.0.0"), is_prod)?,
                port: get_env("PORT", Some("12355"), is_prod)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!("PORT must be a valid port: {}", e))
                    })?,
                max_upload_mb: get_env("MAX_UPLOAD_MB", Some("10"), is_prod)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!(
                            "MAX_UPLOAD_MB must be an integer: {}",
                            e
                        ))
                    })?,
            },
            openai: OpenAiSettings {
                // Empty in dev is allowed; the provider reports NotConfigured per request.
                api_key: get_env("OPENAI_API_KEY", Some(""), is_prod)?,
                model: get_env("OPENAI_MODEL", Some("gpt-4o"), is_prod)?,
                api_base: get_env("OPENAI_API_BASE", Some("https://api.openai.com/v1"), is_prod)?,
            },
            uploads: UploadSettings {
                dir: PathBuf::from(get_env("UPLOAD_DIR", Some("uploads"), is_prod)?),
            },
            classifier: ClassifierSettings {
                extraction_dir: PathBuf::from(get_env(
                    "EXTRACTION_DIR",
                    Some("/opt/tooth_analyzer/extraction"),
                    is_prod,
                )?),
                rootcanal_dir: PathBuf::from(get_env(
                    "ROOTCANAL_DIR",
                    Some("/opt/tooth_analyzer/rootcanal"),
                    is_prod,
                )?),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod && default.map(str::is_empty).unwrap_or(true) {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
