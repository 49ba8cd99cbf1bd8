use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "HARVESTER";
const DEFAULT_FILE: &str = "harvester";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    None,
    Url,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("max_pages must be at least 1")]
    ZeroPages,
    #[error("proxy_mode = \"url\" requires proxy_url")]
    MissingProxyUrl,
}

/// Run settings: defaults, then `harvester.toml`, then `HARVESTER_*` env vars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: String,
    pub platform_domain: String,
    pub listing_path: String,
    pub max_pages: usize,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub proxy_mode: ProxyMode,
    pub proxy_url: Option<String>,
    pub save_error_evidence: bool,
    pub evidence_dir: PathBuf,
    /// Extra names that must never be taken for a job title.
    pub company_names: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: "data/harvester.sqlite".into(),
            platform_domain: "careers.example.com".into(),
            listing_path: "/jobs/search".into(),
            max_pages: 1000,
            max_concurrency: 10,
            max_retries: 3,
            base_backoff_ms: 2000,
            request_timeout_secs: 30,
            user_agent: concat!("career_harvester/", env!("CARGO_PKG_VERSION")).into(),
            proxy_mode: ProxyMode::None,
            proxy_url: None,
            save_error_evidence: true,
            evidence_dir: PathBuf::from("data/evidence"),
            company_names: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from `file`, or from `harvester.toml` in the working directory if present.
    pub fn load_from(file: Option<&Path>) -> Result<Self, SettingsError> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file_source)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("company_names"),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_concurrency == 0 {
            return Err(SettingsError::ZeroConcurrency);
        }
        if self.max_pages == 0 {
            return Err(SettingsError::ZeroPages);
        }
        if self.proxy_mode == ProxyMode::Url
            && self.proxy_url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(SettingsError::MissingProxyUrl);
        }
        Ok(())
    }

    /// First listing page for a tenant subdomain.
    pub fn seed_url(&self, subdomain: &str) -> String {
        format!(
            "https://{}.{}{}",
            subdomain.trim().to_lowercase(),
            self.platform_domain,
            self.listing_path
        )
    }

    /// Proxy to route requests through, if any.
    pub fn proxy(&self) -> Option<&str> {
        match self.proxy_mode {
            ProxyMode::None => None,
            ProxyMode::Url => self.proxy_url.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.seed_url("Acme"), "https://acme.careers.example.com/jobs/search");
        assert_eq!(s.proxy(), None);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            f,
            "max_pages = 25\nproxy_mode = \"url\"\nproxy_url = \"http://proxy.local:8080\"\n\
             company_names = [\"Acme Health\", \"Acme Group\"]"
        )
        .unwrap();
        let s = Settings::load_from(Some(f.path())).unwrap();
        assert_eq!(s.max_pages, 25);
        assert_eq!(s.max_concurrency, 10);
        assert_eq!(s.proxy(), Some("http://proxy.local:8080"));
        assert_eq!(s.company_names, vec!["Acme Health", "Acme Group"]);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut s = Settings::default();
        s.max_concurrency = 0;
        assert!(matches!(s.validate(), Err(SettingsError::ZeroConcurrency)));

        let mut s = Settings::default();
        s.max_pages = 0;
        assert!(matches!(s.validate(), Err(SettingsError::ZeroPages)));

        let mut s = Settings::default();
        s.proxy_mode = ProxyMode::Url;
        assert!(matches!(s.validate(), Err(SettingsError::MissingProxyUrl)));
    }
}
