//! Persisted settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use transport::{Backend, Ollama, OpenAiCompatible};

use crate::diff::{MissingParentPolicy, ResolvePolicy};

/// Chat backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Groq,
    Ollama,
    OpenAi,
}

impl BackendKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Groq => "Groq",
            BackendKind::Ollama => "Ollama",
            BackendKind::OpenAi => "OpenAI",
        }
    }

    pub fn all() -> &'static [BackendKind] {
        &[BackendKind::Groq, BackendKind::Ollama, BackendKind::OpenAi]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// All settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeSettings {
    pub backend: BackendKind,
    pub groq_api_key: String,
    pub open_ai_api_key: String,
    pub ollama_url: String,
    pub groq_model: String,
    pub ollama_model: String,
    pub open_ai_model: String,
    /// Follow-up attempts after a transport failure
    pub max_error_retries: u32,
    /// Use streamed completions when the backend supports them
    pub stream: bool,
    pub allow_object_creation: bool,
    pub allow_component_creation: bool,
    pub missing_parent: MissingParentPolicy,
    /// Consecutive tool-call rounds allowed in one prompt
    pub max_tool_rounds: u32,
}

impl Default for ForgeSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Groq,
            groq_api_key: String::new(),
            open_ai_api_key: String::new(),
            ollama_url: "http://localhost:11434".to_string(),
            groq_model: "gemma2-9b-it".to_string(),
            ollama_model: "sceneforge".to_string(),
            open_ai_model: "gpt-3.5-turbo".to_string(),
            max_error_retries: 3,
            stream: true,
            allow_object_creation: true,
            allow_component_creation: true,
            missing_parent: MissingParentPolicy::CreateAtRoot,
            max_tool_rounds: 8,
        }
    }
}

impl ForgeSettings {
    /// `settings.json` in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "sceneforge", "sceneforge")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return default if not found.
    /// API keys from the environment take precedence.
    pub fn load() -> Self {
        let mut settings = Self::default_path()
            .and_then(|path| match Self::load_from(&path) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    tracing::debug!(path = %path.display(), "using default settings: {e}");
                    None
                }
            })
            .unwrap_or_default();
        settings.apply_env();
        settings
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save settings to the default path
    pub fn save(&self) -> Result<(), SettingsError> {
        match Self::default_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, var: impl Fn(&str) -> Option<String>) {
        let nonempty = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = nonempty("GROQ_API_KEY") {
            self.groq_api_key = key;
        }
        if let Some(key) = nonempty("OPENAI_API_KEY") {
            self.open_ai_api_key = key;
        }
    }

    pub fn resolve_policy(&self) -> ResolvePolicy {
        ResolvePolicy {
            allow_object_creation: self.allow_object_creation,
            allow_component_creation: self.allow_component_creation,
            missing_parent: self.missing_parent,
        }
    }

    /// Model name for the selected backend
    pub fn model(&self) -> &str {
        match self.backend {
            BackendKind::Groq => &self.groq_model,
            BackendKind::Ollama => &self.ollama_model,
            BackendKind::OpenAi => &self.open_ai_model,
        }
    }

    pub fn set_model(&mut self, model: &str) {
        let slot = match self.backend {
            BackendKind::Groq => &mut self.groq_model,
            BackendKind::Ollama => &mut self.ollama_model,
            BackendKind::OpenAi => &mut self.open_ai_model,
        };
        *slot = model.to_string();
    }

    pub fn build_backend(&self) -> Backend {
        match self.backend {
            BackendKind::Groq => Backend::OpenAi(OpenAiCompatible::groq(&self.groq_api_key, &self.groq_model)),
            BackendKind::OpenAi => {
                Backend::OpenAi(OpenAiCompatible::openai(&self.open_ai_api_key, &self.open_ai_model))
            }
            BackendKind::Ollama => Backend::Ollama(Ollama::new(&self.ollama_url, &self.ollama_model)),
        }
    }
}
