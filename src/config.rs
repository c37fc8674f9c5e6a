//! Configuration manager for users-api.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REQUEST_TIMEOUT: u64 = 10;
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Listening port.
    pub port: u16,
    /// Static key expected on the `Authorization` header.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Seconds before an in-flight request is aborted.
    pub request_timeout: u64,
    #[serde(skip_deserializing)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to Redis configuration.
    #[serde(skip_serializing)]
    pub redis: Option<Redis>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Related to cache entries.
    pub cache: Cache,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_CRATE_NAME").to_owned(),
            port: DEFAULT_PORT,
            api_key: String::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            postgres: None,
            redis: None,
            argon2: None,
            cache: Cache::default(),
        }
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Full connection URI. Takes precedence over the other fields.
    pub url: Option<String>,
    /// Hostname:(?port) for PostgreSQL instance.
    #[serde(default)]
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Redis configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Redis {
    /// Connection URI, e.g. `redis://127.0.0.1/`.
    pub url: String,
}

/// Cache entries configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Cache {
    /// Time-to-live of every entry, in seconds.
    pub ttl: u64,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            ttl: crate::cache::DEFAULT_TTL.as_secs(),
        }
    }
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

#[cfg(test)]
impl Argon2 {
    /// Cheap parameters for tests.
    pub fn light() -> Self {
        Self {
            memory_cost: 1024,
            iterations: 1,
            parallelism: 1,
            hash_length: 32,
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Time-to-live of cache entries.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl)
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location, then applies environment overrides.
    pub fn read(self) -> Arc<Self> {
        let default_path = Path::new(DEFAULT_CONFIG_PATH).to_path_buf();
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &default_path
        };

        let config = Self::load(file_path);

        Arc::new(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Override file values with environment variables.
    pub fn with_env<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }

        if let Some(key) = var("USERS_API_KEY") {
            self.api_key = key;
        }

        if let Some(url) = var("DATABASE_URL").filter(|u| !u.is_empty()) {
            self.postgres.get_or_insert_with(Postgres::default).url = Some(url);
        }

        if let Some(url) = var("REDIS_URL")
            .or_else(|| var("REDIS_URI"))
            .filter(|u| !u.is_empty())
        {
            self.redis = Some(Redis { url });
        }

        self
    }

    /// Parse the file at `path`. A missing file is the normal case for
    /// env-only deployments; any other failure is reported.
    fn load(path: &Path) -> Self {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    path = %path.display(),
                    "no configuration file, using defaults"
                );
                return Self::default();
            },
            Err(err) => return Self::error(path, err),
        };

        match serde_yaml::from_reader::<_, Configuration>(file) {
            Ok(mut config) => {
                // set app version.
                config.version = VERSION.to_owned();
                config
            },
            Err(err) => Self::error(path, err),
        }
    }

    /// Return a default configuration as fallback.
    fn error(path: &Path, err: impl std::error::Error) -> Self {
        tracing::error!(
            path = %path.display(),
            error = %err,
            "cannot read configuration file, using defaults"
        );
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.postgres.is_none());
        assert!(config.redis.is_none());
    }

    #[test]
    fn test_yaml() {
        let yaml = r#"
name: users
port: 3000
api_key: from-file
postgres:
  address: localhost:5432
  database: users
cache:
  ttl: 60
"#;
        let config: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "users");
        assert_eq!(config.port, 3000);
        assert_eq!(config.api_key, "from-file");
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(
            config.postgres.unwrap().database.as_deref(),
            Some("users")
        );
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("PORT", "9000"),
            ("USERS_API_KEY", "secret-key"),
            ("DATABASE_URL", "postgres://u:p@db/users"),
            ("REDIS_URI", "redis://cache/"),
        ]);
        let config = Configuration::default()
            .with_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.port, 9000);
        assert_eq!(config.api_key, "secret-key");
        assert_eq!(
            config.postgres.and_then(|p| p.url).as_deref(),
            Some("postgres://u:p@db/users")
        );
        assert_eq!(config.redis.unwrap().url, "redis://cache/");
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let config = Configuration::default().with_env(|key| {
            (key == "PORT").then(|| "not-a-port".to_owned())
        });
        assert_eq!(config.port, DEFAULT_PORT);
    }

    /// Run `f` under a subscriber writing plain-text logs into a buffer.
    fn captured_logs(f: impl FnOnce()) -> String {
        #[derive(Clone, Default)]
        struct Buffer(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Buffer {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let mut config = None;
        let logs = captured_logs(|| {
            config = Some(Configuration::load(Path::new(
                "/nonexistent/users-api/config.yaml",
            )));
        });

        assert_eq!(config, Some(Configuration::default()));
        assert!(logs.contains("INFO"));
        assert!(!logs.contains("ERROR"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let path = std::env::temp_dir()
            .join(format!("users-api-{}.yaml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "port: [not, a, port").unwrap();

        let mut config = None;
        let logs = captured_logs(|| config = Some(Configuration::load(&path)));
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config, Some(Configuration::default()));
        assert!(logs.contains("ERROR"));
        assert!(logs.contains("cannot read configuration file"));
    }
}
