//! Process configuration from environment variables.
//!
//! Missing chat-provider settings degrade the corresponding adapter rather
//! than failing startup, so `from_env` never errors.

use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the HTTP server.
    pub host: String,
    pub port: u16,
    /// Path of the SQLite file backing the task store.
    pub db_path: PathBuf,
    /// Directory holding the single-page frontend.
    pub public_dir: PathBuf,
    pub azure_openai: Option<AzureOpenAiConfig>,
    pub foundry: Option<FoundryConfig>,
}

/// Azure OpenAI deployment used by the tool-calling chat agent.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_key: String,
    pub api_version: String,
}

/// Hosted agent service used by the foundry chat adapter.
#[derive(Debug, Clone)]
pub struct FoundryConfig {
    pub endpoint: String,
    pub agent_id: String,
    pub api_key: String,
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        let host = env_nonempty("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_nonempty("PORT")
            .and_then(|p| match p.parse() {
                Ok(port) => Some(port),
                Err(_) => {
                    tracing::warn!("Invalid PORT value {:?}, using default 3000", p);
                    None
                }
            })
            .unwrap_or(3000);

        let db_path = env_nonempty("TASKS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("tasks.db"));
        let public_dir = env_nonempty("PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("public"));

        let azure_openai = match (
            env_nonempty("AZURE_OPENAI_ENDPOINT"),
            env_nonempty("AZURE_OPENAI_DEPLOYMENT_NAME"),
            env_nonempty("AZURE_OPENAI_API_KEY"),
        ) {
            (Some(endpoint), Some(deployment), Some(api_key)) => Some(AzureOpenAiConfig {
                endpoint,
                deployment,
                api_key,
                api_version: env_nonempty("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| "2024-10-21".to_string()),
            }),
            _ => None,
        };

        let foundry = match (
            env_nonempty("AZURE_AI_FOUNDRY_PROJECT_ENDPOINT"),
            env_nonempty("AZURE_AI_FOUNDRY_AGENT_ID"),
            env_nonempty("AZURE_AI_FOUNDRY_API_KEY"),
        ) {
            (Some(endpoint), Some(agent_id), Some(api_key)) => Some(FoundryConfig {
                endpoint,
                agent_id,
                api_key,
            }),
            _ => None,
        };

        Self {
            host,
            port,
            db_path,
            public_dir,
            azure_openai,
            foundry,
        }
    }
}
