use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_CBR_URL: &str = "https://www.cbr.ru";
pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "localhost".to_string(),
            port: 8000,
            debug: false,
        }
    }
}

/// Connection settings shown on the dashboard. Nothing connects with them.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: String,
    pub name: String,
    pub user: String,
    pub password: String,
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: "5432".to_string(),
            name: "test_db".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            url: String::new(),
        }
    }
}

impl DatabaseConfig {
    /// One `*` per password character, or "Not set".
    pub fn masked_password(&self) -> String {
        if self.password.is_empty() {
            "Not set".to_string()
        } else {
            "*".repeat(self.password.chars().count())
        }
    }

    pub fn display_url(&self) -> &str {
        if self.url.is_empty() {
            "Not set"
        } else {
            &self.url
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CbrProviderConfig {
    pub base_url: String,
    #[serde(default = "default_fiat_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CoinGeckoProviderConfig {
    pub base_url: String,
    #[serde(default = "default_crypto_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_chart_timeout")]
    pub chart_timeout_secs: u64,
}

fn default_fiat_timeout() -> u64 {
    10
}

fn default_crypto_timeout() -> u64 {
    10
}

fn default_chart_timeout() -> u64 {
    30
}

fn default_fiat_pause_ms() -> u64 {
    100
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProvidersConfig {
    pub cbr: Option<CbrProviderConfig>,
    pub coingecko: Option<CoinGeckoProviderConfig>,
    #[serde(default = "default_fiat_pause_ms")]
    pub fiat_pause_ms: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            cbr: Some(CbrProviderConfig {
                base_url: DEFAULT_CBR_URL.to_string(),
                timeout_secs: default_fiat_timeout(),
            }),
            coingecko: Some(CoinGeckoProviderConfig {
                base_url: DEFAULT_COINGECKO_URL.to_string(),
                timeout_secs: default_crypto_timeout(),
                chart_timeout_secs: default_chart_timeout(),
            }),
            fiat_pause_ms: default_fiat_pause_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentTarget {
    #[default]
    Local,
    Vercel,
}

impl DeploymentTarget {
    pub fn name(&self) -> &'static str {
        match self {
            DeploymentTarget::Local => "localhost",
            DeploymentTarget::Vercel => "vercel",
        }
    }

    /// File name prefix of the backgrounds served for this target.
    pub fn background_prefix(&self) -> &'static str {
        match self {
            DeploymentTarget::Local => "localhost_bg",
            DeploymentTarget::Vercel => "vercel_bg",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub deployment: DeploymentTarget,
    pub static_dir: Option<String>,
}

impl AppConfig {
    /// Loads the default config file when present, then applies environment overrides.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            debug!("No config at {}, using defaults", config_path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_with_env<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let mut config = Self::load_from_path(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Exports variables from a `.env` file in the working directory or its parents.
    /// Variables already set in the process win. A missing file is not an error.
    pub fn load_dotenv() {
        match dotenv::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) => debug!("No .env file loaded: {}", e),
        }
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("ru", "rubrates", "rubrates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Overrides file values with environment variables resolved through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: '{port}'"))?;
        }
        if let Some(debug) = lookup("DEBUG") {
            self.server.debug = debug.trim().eq_ignore_ascii_case("true");
        }

        let db = &mut self.database;
        for (key, field) in [
            ("DB_HOST", &mut db.host),
            ("DB_PORT", &mut db.port),
            ("DB_NAME", &mut db.name),
            ("DB_USER", &mut db.user),
            ("DB_PASSWORD", &mut db.password),
            ("DB_URL", &mut db.url),
        ] {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }

        if let Some(dir) = lookup("STATIC_DIR") {
            self.static_dir = Some(dir);
        }

        if lookup("VERCEL").as_deref() == Some("1")
            || self.server.host.to_lowercase().contains("vercel")
        {
            self.deployment = DeploymentTarget::Vercel;
        }

        Ok(())
    }

    pub fn static_path(&self) -> PathBuf {
        PathBuf::from(self.static_dir.as_deref().unwrap_or("static"))
    }

    pub fn cbr(&self) -> CbrProviderConfig {
        self.providers.cbr.clone().unwrap_or(CbrProviderConfig {
            base_url: DEFAULT_CBR_URL.to_string(),
            timeout_secs: default_fiat_timeout(),
        })
    }

    pub fn coingecko(&self) -> CoinGeckoProviderConfig {
        self.providers
            .coingecko
            .clone()
            .unwrap_or(CoinGeckoProviderConfig {
                base_url: DEFAULT_COINGECKO_URL.to_string(),
                timeout_secs: default_crypto_timeout(),
                chart_timeout_secs: default_chart_timeout(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 8000);
        assert!(!config.server.debug);
        assert_eq!(config.database.name, "test_db");
        assert_eq!(config.database.user, "postgres");
        assert_eq!(config.deployment, DeploymentTarget::Local);
        assert_eq!(config.providers.fiat_pause_ms, 100);
        assert_eq!(config.cbr().base_url, DEFAULT_CBR_URL);
        assert_eq!(config.coingecko().chart_timeout_secs, 30);
        assert_eq!(config.static_path(), PathBuf::from("static"));
    }

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
server:
  host: "0.0.0.0"
  port: 9000
database:
  name: "rates"
  password: "secret"
providers:
  cbr:
    base_url: "http://example.com/cbr"
  coingecko:
    base_url: "http://example.com/gecko"
    chart_timeout_secs: 60
  fiat_pause_ms: 0
static_dir: "/srv/static"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert!(!config.server.debug);
        assert_eq!(config.database.name, "rates");
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.password, "secret");

        let cbr = config.cbr();
        assert_eq!(cbr.base_url, "http://example.com/cbr");
        assert_eq!(cbr.timeout_secs, 10);
        let gecko = config.coingecko();
        assert_eq!(gecko.base_url, "http://example.com/gecko");
        assert_eq!(gecko.timeout_secs, 10);
        assert_eq!(gecko.chart_timeout_secs, 60);
        assert_eq!(config.providers.fiat_pause_ms, 0);
        assert_eq!(config.static_path(), PathBuf::from("/srv/static"));
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("HOST", "127.0.0.1"),
                ("PORT", "8080"),
                ("DEBUG", "True"),
                ("DB_HOST", "db.internal"),
                ("DB_PASSWORD", "hunter2"),
                ("DB_URL", "postgres://db.internal/rates"),
            ]))
            .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.debug);
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, "5432");
        assert_eq!(config.database.masked_password(), "*******");
        assert_eq!(config.database.display_url(), "postgres://db.internal/rates");
        assert_eq!(config.deployment, DeploymentTarget::Local);
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid PORT value: 'eighty'");
    }

    #[test]
    fn test_vercel_detection() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("VERCEL", "1")])).unwrap();
        assert_eq!(config.deployment, DeploymentTarget::Vercel);

        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("HOST", "my-app.Vercel.app")]))
            .unwrap();
        assert_eq!(config.deployment, DeploymentTarget::Vercel);
        assert_eq!(config.deployment.background_prefix(), "vercel_bg");

        let mut config = AppConfig::default();
        config.apply_env(env(&[("VERCEL", "0")])).unwrap();
        assert_eq!(config.deployment, DeploymentTarget::Local);
    }

    #[test]
    fn test_dotenv_values_reach_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# deployment settings\nHOST=0.0.0.0\nPORT=9191\nDB_PASSWORD=\"s3cret\"\nVERCEL=1\n",
        )
        .unwrap();

        let vars: HashMap<String, String> = dotenv::from_path_iter(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let mut config = AppConfig::default();
        config.apply_env(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.database.password, "s3cret");
        assert_eq!(config.deployment, DeploymentTarget::Vercel);
    }

    #[test]
    fn test_unset_database_values_display() {
        let db = DatabaseConfig::default();
        assert_eq!(db.masked_password(), "Not set");
        assert_eq!(db.display_url(), "Not set");
    }
}
