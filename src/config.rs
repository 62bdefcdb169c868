//! Runtime configuration: credentials, endpoints and request limits.
//!
//! Values come from an optional TOML file and are overridden by `REPOCHAT_*`
//! environment variables (a `.env` file in the working directory is honoured).

use crate::apis::http::ClientOptions;
use crate::models::{Credential, ProviderKind};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "REPOCHAT";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub app_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Upper bound on in-flight requests per provider client
    pub max_concurrent_requests: usize,
    /// Cancels fallback searches that run longer than this
    pub search_timeout_secs: Option<u64>,
    pub github: ProviderSettings,
    pub gitlab: ProviderSettings,
    pub bitbucket: ProviderSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: format!("repochat/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 15,
            max_concurrent_requests: 4,
            search_timeout_secs: None,
            github: ProviderSettings::default(),
            gitlab: ProviderSettings::default(),
            bitbucket: ProviderSettings::default(),
        }
    }
}

impl Config {
    /// Load `.env`, the config file and environment overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply `REPOCHAT_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}_{}", ENV_PREFIX, name));

        if let Some(agent) = var("USER_AGENT") {
            self.user_agent = agent;
        }
        if let Some(secs) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = secs
                .parse()
                .with_context(|| format!("Invalid REQUEST_TIMEOUT_SECS: {}", secs))?;
        }
        if let Some(limit) = var("MAX_CONCURRENT_REQUESTS") {
            self.max_concurrent_requests = limit
                .parse()
                .with_context(|| format!("Invalid MAX_CONCURRENT_REQUESTS: {}", limit))?;
        }
        if let Some(secs) = var("SEARCH_TIMEOUT_SECS") {
            self.search_timeout_secs = Some(
                secs.parse()
                    .with_context(|| format!("Invalid SEARCH_TIMEOUT_SECS: {}", secs))?,
            );
        }

        for kind in ProviderKind::ALL {
            let prefix = kind.as_str().to_ascii_uppercase();
            let settings = self.settings_mut(kind);
            if let Some(url) = var(&format!("{}_BASE_URL", prefix)) {
                settings.base_url = Some(url);
            }
            if let Some(token) = var(&format!("{}_TOKEN", prefix)) {
                settings.token = Some(token);
            }
            if let Some(username) = var(&format!("{}_USERNAME", prefix)) {
                settings.username = Some(username);
            }
            if let Some(password) = var(&format!("{}_APP_PASSWORD", prefix)) {
                settings.app_password = Some(password);
            }
        }

        Ok(())
    }

    pub fn settings(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::GitHub => &self.github,
            ProviderKind::GitLab => &self.gitlab,
            ProviderKind::Bitbucket => &self.bitbucket,
        }
    }

    fn settings_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::GitHub => &mut self.github,
            ProviderKind::GitLab => &mut self.gitlab,
            ProviderKind::Bitbucket => &mut self.bitbucket,
        }
    }

    /// Credential configured for a provider, if any.
    pub fn credential(&self, kind: ProviderKind) -> Option<Credential> {
        let settings = self.settings(kind);
        match kind {
            ProviderKind::Bitbucket => match (&settings.username, &settings.app_password) {
                (Some(user), Some(password)) => Some(Credential::basic(user, password)),
                _ => None,
            },
            ProviderKind::GitHub | ProviderKind::GitLab => {
                settings.token.as_ref().map(Credential::token)
            }
        }
    }

    pub fn client_options(&self, kind: ProviderKind) -> ClientOptions {
        ClientOptions {
            base_url: self
                .settings(kind)
                .base_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_string()),
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_concurrent_requests: self.max_concurrent_requests.max(1),
        }
    }

    pub fn search_timeout(&self) -> Option<Duration> {
        self.search_timeout_secs.map(Duration::from_secs)
    }
}

/// `$REPOCHAT_CONFIG`, else `<config dir>/repochat/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("repochat").join("config.toml"))
}
