use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "connecthub", about = "A small server-rendered discussion forum")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on the time a single request may take end to end.
    pub request_timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_minutes: i64,
    pub password_cost: u32,
    pub purge_interval_secs: u64,
    /// Accounts signing up with one of these emails become administrators.
    pub admin_emails: Vec<String>,
    pub moderator_emails: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 8,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session_token".to_string(),
            session_minutes: 60,
            password_cost: bcrypt::DEFAULT_COST,
            purge_interval_secs: 600,
            admin_emails: Vec::new(),
            moderator_emails: Vec::new(),
        }
    }
}

/// Longest session a config file may ask for: one year.
pub const MAX_SESSION_MINUTES: i64 = 60 * 24 * 365;

impl AuthConfig {
    fn session_minutes_clamped(&self) -> i64 {
        self.session_minutes.clamp(0, MAX_SESSION_MINUTES)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_minutes_clamped())
    }

    pub fn session_max_age_secs(&self) -> i64 {
        self.session_minutes_clamped() * 60
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("forum.db"));
        }

        anyhow::ensure!(
            (1..=MAX_SESSION_MINUTES).contains(&config.auth.session_minutes),
            "auth.session_minutes must be between 1 and {MAX_SESSION_MINUTES}, got {}",
            config.auth.session_minutes
        );

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".connecthub")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("forum.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_for(data_dir: Option<PathBuf>) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir,
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.cookie_name, "session_token");
        assert_eq!(config.auth.session_minutes, 60);
        assert_eq!(config.auth.session_max_age_secs(), 3600);
        assert!(config.database.path.is_none());
        assert!(config.auth.admin_emails.is_empty());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_for(Some(PathBuf::from("/tmp/test-connecthub")));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-connecthub"));
    }

    #[test]
    fn data_dir_defaults_to_dot_connecthub() {
        let dir = Config::data_dir(&cli_for(None));
        assert!(dir.ends_with(".connecthub"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(Some(tmp.path().to_path_buf()))).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.db_path(), tmp.path().join("forum.db"));
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
pool_size = 2

[auth]
cookie_name = "forum_session"
session_minutes = 15
admin_emails = ["root@example.com"]
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: None,
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.database.pool_size, 2);
        assert_eq!(config.auth.cookie_name, "forum_session");
        assert_eq!(config.auth.session_ttl(), chrono::Duration::minutes(15));
        assert_eq!(config.auth.admin_emails, vec!["root@example.com"]);
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[server]\nhost = \"192.168.1.1\"\nport = 9000\n").unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn load_rejects_out_of_range_session_minutes() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[auth]\nsession_minutes = 9223372036854775807\n",
        )
        .unwrap();
        let err = Config::load(&cli_for(Some(tmp.path().to_path_buf()))).unwrap_err();
        assert!(err.to_string().contains("session_minutes"));
    }

    #[test]
    fn session_lengths_are_clamped_instead_of_overflowing() {
        let mut auth = AuthConfig::default();
        auth.session_minutes = i64::MAX;
        assert_eq!(auth.session_ttl(), chrono::Duration::minutes(MAX_SESSION_MINUTES));
        auth.session_minutes = -5;
        assert_eq!(auth.session_max_age_secs(), 0);
    }
}
